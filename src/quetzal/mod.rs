//! [Quetzal](http://inform-fiction.org/zmachine/standards/quetzal/index.html) save file format
use crate::{error::*, fatal_error, iff::Chunk};

pub mod ifhd;
pub mod mem;
pub mod stks;

pub use ifhd::IFhd;
pub use mem::Mem;
pub use stks::{Stk, Stks};

/// Interpreter id written to `IntD` chunks
pub const INTERPRETER_ID: &str = "ZLNE";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Interpreter-dependent data, ignored by other interpreters
pub struct IntD {
    os_id: Vec<u8>,
    interpreter_id: Vec<u8>,
    data: Vec<u8>,
}

impl IntD {
    pub fn new(data: Vec<u8>) -> IntD {
        IntD {
            os_id: b"    ".to_vec(),
            interpreter_id: INTERPRETER_ID.as_bytes().to_vec(),
            data,
        }
    }

    /// Was this chunk written by this interpreter?
    pub fn is_ours(&self) -> bool {
        self.interpreter_id == INTERPRETER_ID.as_bytes()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl TryFrom<&Chunk> for IntD {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        if data.len() < 12 {
            return fatal_error!(
                ErrorCode::Quetzal,
                "IntD chunk needs at least 12 bytes, found {}",
                data.len()
            );
        }

        Ok(IntD {
            os_id: data[0..4].to_vec(),
            interpreter_id: data[8..12].to_vec(),
            data: data[12..].to_vec(),
        })
    }
}

impl From<&IntD> for Chunk {
    fn from(value: &IntD) -> Self {
        let mut data = value.os_id.clone();
        // Flags, contents id, reserved
        data.extend([0, 0, 0, 0]);
        data.extend(&value.interpreter_id);
        data.extend(&value.data);
        Chunk::new_chunk("IntD", data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quetzal {
    ifhd: IFhd,
    mem: Mem,
    stks: Stks,
    intd: Option<IntD>,
    annotation: Option<String>,
}

impl TryFrom<&[u8]> for Quetzal {
    type Error = RuntimeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let form = Chunk::try_from(value)?;
        if form.id() != "FORM" || form.sub_id() != "IFZS" {
            error!(target: "app::quetzal", "Not a Quetzal file: {}", form);
            return fatal_error!(
                ErrorCode::Quetzal,
                "Expected FORM/IFZS, found {}/{}",
                form.id(),
                form.sub_id()
            );
        }

        let ifhd = match form.find_chunk("IFhd") {
            Some(c) => IFhd::try_from(c)?,
            None => return fatal_error!(ErrorCode::Quetzal, "Quetzal is missing IFhd chunk"),
        };
        let mem = match form
            .find_chunk("CMem")
            .or_else(|| form.find_chunk("UMem"))
        {
            Some(c) => Mem::from(c),
            None => {
                return fatal_error!(
                    ErrorCode::Quetzal,
                    "Quetzal is missing memory (CMem or UMem) chunk"
                )
            }
        };
        let stks = match form.find_chunk("Stks") {
            Some(c) => Stks::try_from(c)?,
            None => return fatal_error!(ErrorCode::Quetzal, "Quetzal is missing Stks chunk"),
        };
        let intd = match form.find_chunk("IntD") {
            Some(c) => Some(IntD::try_from(c)?),
            None => None,
        };
        let annotation = form
            .find_chunk("ANNO")
            .map(|c| String::from_utf8_lossy(c.data()).to_string());

        for c in form.chunks() {
            match c.id().as_str() {
                "IFhd" | "CMem" | "UMem" | "Stks" | "IntD" | "ANNO" => {}
                _ => debug!(target: "app::quetzal", "Ignoring chunk {}", c),
            }
        }

        Ok(Quetzal {
            ifhd,
            mem,
            stks,
            intd,
            annotation,
        })
    }
}

impl From<&Quetzal> for Vec<u8> {
    fn from(value: &Quetzal) -> Self {
        let mut chunks = vec![
            Chunk::from(&value.ifhd),
            Chunk::from(&value.mem),
            Chunk::from(&value.stks),
        ];
        if let Some(intd) = &value.intd {
            chunks.push(Chunk::from(intd));
        }
        if let Some(annotation) = &value.annotation {
            chunks.push(Chunk::new_chunk("ANNO", annotation.as_bytes().to_vec()));
        }

        Vec::from(&Chunk::new_form("IFZS", chunks))
    }
}

impl Quetzal {
    pub fn new(ifhd: IFhd, mem: Mem, stks: Stks) -> Quetzal {
        Quetzal {
            ifhd,
            mem,
            stks,
            intd: None,
            annotation: None,
        }
    }

    pub fn with_intd(mut self, intd: IntD) -> Quetzal {
        self.intd = Some(intd);
        self
    }

    pub fn with_annotation(mut self, annotation: &str) -> Quetzal {
        self.annotation = Some(annotation.to_string());
        self
    }

    pub fn ifhd(&self) -> &IFhd {
        &self.ifhd
    }

    pub fn mem(&self) -> &Mem {
        &self.mem
    }

    pub fn stks(&self) -> &Stks {
        &self.stks
    }

    pub fn intd(&self) -> Option<&IntD> {
        self.intd.as_ref()
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }
}
