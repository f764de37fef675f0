//! [Object](https://inform-fiction.org/zmachine/standards/z1point1/sect12.html) table access
use crate::{
    error::*,
    fatal_error, recoverable_error,
    zmachine::{header::HeaderField, ZMachine},
};

pub mod attribute;
pub mod property;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Object tree links
enum Relative {
    Parent,
    Sibling,
    Child,
}

impl Relative {
    /// Offset of the link in an object table entry
    fn offset(&self, version: u8) -> usize {
        match (self, version) {
            (Relative::Parent, 3) => 4,
            (Relative::Sibling, 3) => 5,
            (Relative::Child, 3) => 6,
            (Relative::Parent, _) => 6,
            (Relative::Sibling, _) => 8,
            (Relative::Child, _) => 10,
        }
    }
}

/// Gets the byte address of an object's table entry
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the byte address of the object table entry or a [RuntimeError]
fn object_address(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    let capabilities = zmachine.capabilities();
    if object == 0 || object > capabilities.max_object() {
        return recoverable_error!(ErrorCode::InvalidObject, "Invalid object {}", object);
    }

    let table = zmachine.header_word(HeaderField::ObjectTable)? as usize;
    Ok(table
        + (capabilities.property_defaults() * 2)
        + (capabilities.object_entry_size() * (object - 1)))
}

fn relative(zmachine: &ZMachine, object: usize, relative: Relative) -> Result<usize, RuntimeError> {
    let object_address = object_address(zmachine, object)?;
    let address = object_address + relative.offset(zmachine.version());
    match zmachine.version() {
        3 => Ok(zmachine.read_byte(address)? as usize),
        _ => Ok(zmachine.read_word(address)? as usize),
    }
}

fn set_relative(
    zmachine: &mut ZMachine,
    object: usize,
    relative: Relative,
    value: usize,
) -> Result<(), RuntimeError> {
    let object_address = object_address(zmachine, object)?;
    let address = object_address + relative.offset(zmachine.version());
    debug!(target: "app::object", "Set {:?} of {} to {}", relative, object, value);
    match zmachine.version() {
        3 => zmachine.write_byte(address, value as u8),
        _ => zmachine.write_word(address, value as u16),
    }
}

/// Gets an object's parent
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the parent object number, 0 if none, or a [RuntimeError]
pub fn parent(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    relative(zmachine, object, Relative::Parent)
}

/// Gets an object's first child
///
/// # Returns
/// [Result] with the child object number, 0 if none, or a [RuntimeError]
pub fn child(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    relative(zmachine, object, Relative::Child)
}

/// Gets an object's next sibling
///
/// # Returns
/// [Result] with the sibling object number, 0 if none, or a [RuntimeError]
pub fn sibling(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    relative(zmachine, object, Relative::Sibling)
}

/// Sets the parent of an object.
///
/// Only the `object` table entry is updated, the rest of the tree is untouched.
pub fn set_parent(
    zmachine: &mut ZMachine,
    object: usize,
    parent: usize,
) -> Result<(), RuntimeError> {
    set_relative(zmachine, object, Relative::Parent, parent)
}

/// Sets the child of an object.
///
/// Only the `object` table entry is updated, the rest of the tree is untouched.
pub fn set_child(zmachine: &mut ZMachine, object: usize, child: usize) -> Result<(), RuntimeError> {
    set_relative(zmachine, object, Relative::Child, child)
}

/// Sets the sibling of an object.
///
/// Only the `object` table entry is updated, the rest of the tree is untouched.
pub fn set_sibling(
    zmachine: &mut ZMachine,
    object: usize,
    sibling: usize,
) -> Result<(), RuntimeError> {
    set_relative(zmachine, object, Relative::Sibling, sibling)
}

/// Detach an object from its parent and siblings.
///
/// The object keeps its children.
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn remove(zmachine: &mut ZMachine, object: usize) -> Result<(), RuntimeError> {
    let parent = parent(zmachine, object)?;
    if parent == 0 {
        return Ok(());
    }

    let next = sibling(zmachine, object)?;
    let first = child(zmachine, parent)?;
    if first == object {
        set_child(zmachine, parent, next)?;
    } else {
        let mut o = first;
        let mut steps = 0;
        loop {
            if o == 0 || steps > zmachine.capabilities().max_object() {
                return fatal_error!(
                    ErrorCode::InvalidObjectTree,
                    "Object {} is not in the child list of its parent {}",
                    object,
                    parent
                );
            }
            let s = sibling(zmachine, o)?;
            if s == object {
                set_sibling(zmachine, o, next)?;
                break;
            }
            o = s;
            steps += 1;
        }
    }

    set_parent(zmachine, object, 0)?;
    set_sibling(zmachine, object, 0)
}

/// Is `ancestor` the object itself or one of its ancestors?
fn is_ancestor(zmachine: &ZMachine, ancestor: usize, object: usize) -> Result<bool, RuntimeError> {
    let mut o = object;
    let mut steps = 0;
    while o != 0 {
        if o == ancestor {
            return Ok(true);
        }
        if steps > zmachine.capabilities().max_object() {
            return fatal_error!(
                ErrorCode::InvalidObjectTree,
                "Parent chain of object {} does not end",
                object
            );
        }
        o = parent(zmachine, o)?;
        steps += 1;
    }

    Ok(false)
}

/// Move an object to become the first child of a destination.
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
/// * `destination` - New parent object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError] if the move would put the object inside itself
pub fn insert(
    zmachine: &mut ZMachine,
    object: usize,
    destination: usize,
) -> Result<(), RuntimeError> {
    // Validate both objects before changing anything
    object_address(zmachine, object)?;
    object_address(zmachine, destination)?;
    if is_ancestor(zmachine, object, destination)? {
        return recoverable_error!(
            ErrorCode::InvalidObjectTree,
            "Inserting object {} into {} would make it its own ancestor",
            object,
            destination
        );
    }

    remove(zmachine, object)?;
    let first = child(zmachine, destination)?;
    set_sibling(zmachine, object, first)?;
    set_child(zmachine, destination, object)?;
    set_parent(zmachine, object, destination)
}

#[cfg(test)]
mod tests {
    use crate::{
        assert_ok, assert_ok_eq,
        test_util::{mock_object, mock_zmachine, test_map},
    };

    use super::*;

    fn tree(version: u8) -> ZMachine {
        // 1
        // +- 2
        // +- 3
        //    +- 4
        let mut map = test_map(version);
        mock_object(&mut map, 1, vec![], (0, 0, 2));
        mock_object(&mut map, 2, vec![], (1, 3, 0));
        mock_object(&mut map, 3, vec![], (1, 0, 4));
        mock_object(&mut map, 4, vec![], (3, 0, 0));
        mock_zmachine(map)
    }

    #[test]
    fn test_object_address() {
        let zmachine = tree(3);
        assert_ok_eq!(object_address(&zmachine, 1), 0x23E);
        assert_ok_eq!(object_address(&zmachine, 2), 0x247);
        let zmachine = tree(5);
        assert_ok_eq!(object_address(&zmachine, 1), 0x27E);
        assert_ok_eq!(object_address(&zmachine, 2), 0x28C);
        let e = object_address(&zmachine, 0).unwrap_err();
        assert_eq!(e.code(), ErrorCode::InvalidObject);
        assert!(e.is_recoverable());
    }

    #[test]
    fn test_relatives() {
        for v in [3, 5, 8] {
            let zmachine = tree(v);
            assert_ok_eq!(parent(&zmachine, 1), 0);
            assert_ok_eq!(child(&zmachine, 1), 2);
            assert_ok_eq!(sibling(&zmachine, 2), 3);
            assert_ok_eq!(parent(&zmachine, 4), 3);
            assert!(parent(&zmachine, 0).is_err());
        }
    }

    #[test]
    fn test_set_relatives() {
        let mut zmachine = tree(5);
        assert_ok!(set_parent(&mut zmachine, 4, 0x123));
        assert_ok_eq!(parent(&zmachine, 4), 0x123);
        assert_ok!(set_sibling(&mut zmachine, 4, 2));
        assert_ok_eq!(sibling(&zmachine, 4), 2);
        assert_ok!(set_child(&mut zmachine, 4, 1));
        assert_ok_eq!(child(&zmachine, 4), 1);
    }

    #[test]
    fn test_remove_first_child() {
        let mut zmachine = tree(3);
        assert_ok!(remove(&mut zmachine, 2));
        assert_ok_eq!(child(&zmachine, 1), 3);
        assert_ok_eq!(parent(&zmachine, 2), 0);
        assert_ok_eq!(sibling(&zmachine, 2), 0);
    }

    #[test]
    fn test_remove_later_child() {
        let mut zmachine = tree(5);
        assert_ok!(remove(&mut zmachine, 3));
        assert_ok_eq!(child(&zmachine, 1), 2);
        assert_ok_eq!(sibling(&zmachine, 2), 0);
        assert_ok_eq!(parent(&zmachine, 3), 0);
        // Children come along
        assert_ok_eq!(child(&zmachine, 3), 4);
        // Removing an orphan is a no-op
        assert_ok!(remove(&mut zmachine, 3));
    }

    #[test]
    fn test_insert() {
        let mut zmachine = tree(3);
        assert_ok!(insert(&mut zmachine, 4, 1));
        assert_ok_eq!(child(&zmachine, 1), 4);
        assert_ok_eq!(sibling(&zmachine, 4), 2);
        assert_ok_eq!(parent(&zmachine, 4), 1);
        assert_ok_eq!(child(&zmachine, 3), 0);

        // Same parent again moves to the front
        assert_ok!(insert(&mut zmachine, 3, 1));
        assert_ok_eq!(child(&zmachine, 1), 3);
        assert_ok_eq!(sibling(&zmachine, 3), 4);
        assert_ok_eq!(sibling(&zmachine, 4), 2);
        assert_ok_eq!(sibling(&zmachine, 2), 0);
    }

    #[test]
    fn test_insert_cycle() {
        let mut zmachine = tree(5);
        let e = insert(&mut zmachine, 1, 4).unwrap_err();
        assert_eq!(e.code(), ErrorCode::InvalidObjectTree);
        let e = insert(&mut zmachine, 3, 3).unwrap_err();
        assert_eq!(e.code(), ErrorCode::InvalidObjectTree);
        // Tree is unchanged
        assert_ok_eq!(parent(&zmachine, 4), 3);
        assert_ok_eq!(child(&zmachine, 1), 2);
        assert_ok_eq!(sibling(&zmachine, 2), 3);
    }
}
