use crate::iff::Chunk;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Dynamic memory, either XOR/RLE compressed (`CMem`) or verbatim (`UMem`)
pub struct Mem {
    compressed: bool,
    memory: Vec<u8>,
}

impl From<&Chunk> for Mem {
    fn from(value: &Chunk) -> Self {
        Mem::new(value.id() == "CMem", value.data().to_vec())
    }
}

impl From<&Mem> for Chunk {
    fn from(value: &Mem) -> Self {
        let id = if value.compressed { "CMem" } else { "UMem" };
        Chunk::new_chunk(id, value.memory.clone())
    }
}

impl Mem {
    pub fn new(compressed: bool, memory: Vec<u8>) -> Mem {
        Mem { compressed, memory }
    }

    pub fn compressed(&self) -> bool {
        self.compressed
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmem() {
        let mem = Mem::new(true, vec![0x00, 0x3F, 0x01]);
        let chunk = Chunk::from(&mem);
        assert_eq!(chunk.id(), "CMem");
        assert_eq!(chunk.data(), &[0x00, 0x3F, 0x01]);
        assert_eq!(Mem::from(&chunk), mem);
    }

    #[test]
    fn test_umem() {
        let mem = Mem::new(false, vec![1, 2, 3, 4]);
        let chunk = Chunk::from(&mem);
        assert_eq!(chunk.id(), "UMem");
        let m = Mem::from(&chunk);
        assert!(!m.compressed());
        assert_eq!(m.memory(), &[1, 2, 3, 4]);
    }
}
