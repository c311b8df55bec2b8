//! Growing binary-tree rectangle packer.
//!
//! Blocks are placed into the first free node (right subtree before down subtree) that fits.
//! When nothing fits, the root grows right or down, preferring whichever keeps the layout
//! closer to square. Input must be sorted with [`sort_blocks`] first.

use crate::error::{CombineError, Result};

/// A rectangle to place. `x`/`y` are only meaningful after [`Packer::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Index of the source image this block stands for.
    pub index: usize,
}

impl Block {
    pub fn new(index: usize, w: u32, h: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w,
            h,
            index,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// Scale position and size, truncating to whole pixels.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: (self.x as f32 * factor) as u32,
            y: (self.y as f32 * factor) as u32,
            w: (self.w as f32 * factor) as u32,
            h: (self.h as f32 * factor) as u32,
            index: self.index,
        }
    }

    pub fn overlaps(&self, other: &Block) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Sort by decreasing height, then decreasing width. Stable, so equal blocks keep input order.
pub fn sort_blocks(blocks: &mut [Block]) {
    blocks.sort_by(|a, b| b.h.cmp(&a.h).then(b.w.cmp(&a.w)));
}

#[derive(Debug, Default)]
struct Node {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<Box<Node>>,
    down: Option<Box<Node>>,
}

impl Node {
    fn leaf(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            ..Self::default()
        }
    }

    /// Depth-first search for a free node at least `w` x `h`.
    fn find(&mut self, w: u32, h: u32) -> Option<&mut Node> {
        if self.used {
            if let Some(found) = self.right.as_deref_mut().and_then(|n| n.find(w, h)) {
                return Some(found);
            }
            return self.down.as_deref_mut().and_then(|n| n.find(w, h));
        }
        if w <= self.w && h <= self.h {
            Some(self)
        } else {
            None
        }
    }

    /// Claim the top-left `w` x `h` of this node and return its origin.
    fn split(&mut self, w: u32, h: u32) -> (u32, u32) {
        self.used = true;
        self.down = Some(Box::new(Node::leaf(self.x, self.y + h, self.w, self.h - h)));
        self.right = Some(Box::new(Node::leaf(self.x + w, self.y, self.w - w, h)));
        (self.x, self.y)
    }
}

/// Binary-tree packer. The tree only ever grows; nodes are never removed.
#[derive(Debug, Default)]
pub struct Packer {
    root: Node,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place every block, writing `x`/`y` in place. Returns the packed `(width, height)`.
    ///
    /// Each call starts from a fresh tree sized to the first block.
    pub fn fit(&mut self, blocks: &mut [Block]) -> Result<(u32, u32)> {
        let Some(first) = blocks.first() else {
            return Ok((0, 0));
        };
        self.root = Node::leaf(0, 0, first.w, first.h);
        let mut width = first.w;
        let mut height = first.h;

        for block in blocks.iter_mut() {
            let (x, y) = match self.root.find(block.w, block.h) {
                Some(node) => node.split(block.w, block.h),
                None => self.grow(block.w, block.h)?,
            };
            block.x = x;
            block.y = y;
            width = width.max(block.right());
            height = height.max(block.bottom());
        }

        Ok((width, height))
    }

    fn grow(&mut self, w: u32, h: u32) -> Result<(u32, u32)> {
        let can_grow_down = w <= self.root.w;
        let can_grow_right = h <= self.root.h;

        // Favour the direction that keeps the layout square
        if can_grow_right && self.root.h >= self.root.w + w {
            return Ok(self.grow_right(w, h));
        }
        if can_grow_down && self.root.w >= self.root.h + h {
            return Ok(self.grow_down(w, h));
        }
        if can_grow_right {
            return Ok(self.grow_right(w, h));
        }
        if can_grow_down {
            return Ok(self.grow_down(w, h));
        }
        Err(CombineError::Unpackable {
            width: w,
            height: h,
        })
    }

    fn grow_right(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old = std::mem::take(&mut self.root);
        let mut right = Node::leaf(old.w, 0, w, old.h);
        let placed = right.split(w, h);
        self.root = Node {
            x: 0,
            y: 0,
            w: old.w + w,
            h: old.h,
            used: true,
            down: Some(Box::new(old)),
            right: Some(Box::new(right)),
        };
        placed
    }

    fn grow_down(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old = std::mem::take(&mut self.root);
        let mut down = Node::leaf(0, old.h, old.w, h);
        let placed = down.split(w, h);
        self.root = Node {
            x: 0,
            y: 0,
            w: old.w,
            h: old.h + h,
            used: true,
            right: Some(Box::new(old)),
            down: Some(Box::new(down)),
        };
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random sizes in `1..=max`.
    fn random_blocks(count: usize, max: u32, seed: u64) -> Vec<Block> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as u32 % max) + 1
        };
        (0..count).map(|i| Block::new(i, next(), next())).collect()
    }

    fn assert_valid_packing(blocks: &[Block], width: u32, height: u32) {
        for (i, a) in blocks.iter().enumerate() {
            assert!(a.right() <= width, "block {} exceeds width", a.index);
            assert!(a.bottom() <= height, "block {} exceeds height", a.index);
            for b in &blocks[i + 1..] {
                assert!(!a.overlaps(b), "blocks {} and {} overlap", a.index, b.index);
            }
        }
    }

    #[test]
    fn test_single_block() {
        let mut blocks = vec![Block::new(0, 10, 7)];
        let (w, h) = Packer::new().fit(&mut blocks).unwrap();
        assert_eq!((w, h), (10, 7));
        assert_eq!((blocks[0].x, blocks[0].y), (0, 0));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Packer::new().fit(&mut []).unwrap(), (0, 0));
    }

    #[test]
    fn test_second_block_grows_right() {
        let mut blocks = vec![Block::new(0, 4, 4), Block::new(1, 4, 4)];
        let (w, h) = Packer::new().fit(&mut blocks).unwrap();
        assert_eq!((w, h), (8, 4));
        assert_eq!((blocks[1].x, blocks[1].y), (4, 0));
    }

    #[test]
    fn test_equal_blocks_stay_compact() {
        for count in 1..=8 {
            let mut blocks: Vec<_> = (0..count).map(|i| Block::new(i, 4, 4)).collect();
            let (w, h) = Packer::new().fit(&mut blocks).unwrap();
            assert_valid_packing(&blocks, w, h);

            let input_area = 16 * count as u32;
            assert!(w * h <= 2 * input_area, "{} blocks packed into {}x{}", count, w, h);
        }
    }

    #[test]
    fn test_four_blocks_fill_square() {
        let mut blocks: Vec<_> = (0..4).map(|i| Block::new(i, 4, 4)).collect();
        let (w, h) = Packer::new().fit(&mut blocks).unwrap();
        assert_eq!((w, h), (8, 8));
        let mut origins: Vec<_> = blocks.iter().map(|b| (b.x, b.y)).collect();
        origins.sort();
        assert_eq!(origins, vec![(0, 0), (0, 4), (4, 0), (4, 4)]);
    }

    #[test]
    fn test_random_blocks_never_overlap() {
        for seed in 1..20 {
            let mut blocks = random_blocks(40, 64, seed);
            sort_blocks(&mut blocks);
            let (w, h) = Packer::new().fit(&mut blocks).unwrap();
            assert_valid_packing(&blocks, w, h);

            let max_right = blocks.iter().map(Block::right).max().unwrap();
            let max_bottom = blocks.iter().map(Block::bottom).max().unwrap();
            assert_eq!((w, h), (max_right, max_bottom));
        }
    }

    #[test]
    fn test_unsorted_input_cannot_grow() {
        let mut blocks = vec![Block::new(0, 2, 2), Block::new(1, 5, 5)];
        let err = Packer::new().fit(&mut blocks).unwrap_err();
        assert!(matches!(err, CombineError::Unpackable { width: 5, height: 5 }));
    }

    #[test]
    fn test_packer_is_reusable() {
        let mut packer = Packer::new();
        let mut first = vec![Block::new(0, 8, 8), Block::new(1, 8, 8)];
        packer.fit(&mut first).unwrap();

        let mut second = vec![Block::new(0, 3, 2)];
        assert_eq!(packer.fit(&mut second).unwrap(), (3, 2));
    }

    #[test]
    fn test_sort_order() {
        let mut blocks = vec![
            Block::new(0, 4, 2),
            Block::new(1, 2, 8),
            Block::new(2, 6, 2),
            Block::new(3, 3, 8),
        ];
        sort_blocks(&mut blocks);
        let order: Vec<_> = blocks.iter().map(|b| b.index).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_block_scaling_truncates() {
        let block = Block {
            x: 5,
            y: 3,
            w: 7,
            h: 9,
            index: 2,
        };
        let scaled = block.scaled(0.5);
        assert_eq!((scaled.x, scaled.y, scaled.w, scaled.h), (2, 1, 3, 4));
        assert_eq!(scaled.index, 2);
    }
}
