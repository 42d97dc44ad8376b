#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Bitmap(u32);

impl Bitmap {
    pub fn new() -> Self {
        Bitmap(0)
    }

    pub fn get(&self, i: u32) -> bool {
        self.0 & (1 << i) != 0
    }

    pub fn set(&self, i: u32) -> Self {
        Bitmap(self.0 | (1 << i))
    }

    pub fn unset(&self, i: u32) -> Self {
        Bitmap(self.0 & !(1 << i))
    }

    pub fn size(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Offset of slot `i` in the dense array: the number of occupied slots
    /// below it.
    pub fn index(&self, i: u32) -> usize {
        (self.0 & ((1 << i) - 1)).count_ones() as usize
    }
}
