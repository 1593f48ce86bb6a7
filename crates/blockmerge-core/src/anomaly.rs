//! Duplicate detection over a bundle buffer.
//!
//! Diagnostics only: each collision is logged at error level and returned,
//! the buffer is never modified and nothing here fails. The merger runs both
//! scans right before reporting a bundle size mismatch.

use std::collections::HashMap;

use crate::block::Block;

/// Two blocks in one bundle sharing a block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateNumber<'a> {
    pub number: u64,
    pub first: &'a Block,
    pub duplicate: &'a Block,
}

/// Two blocks in one bundle sharing a block id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateId<'a> {
    pub id: &'a str,
    pub first: &'a Block,
    pub duplicate: &'a Block,
}

/// Report every block whose number was already seen earlier in `blocks`.
pub fn find_duplicate_numbers(blocks: &[Block]) -> Vec<DuplicateNumber<'_>> {
    let mut seen: HashMap<u64, &Block> = HashMap::with_capacity(blocks.len());
    let mut found = Vec::new();

    for block in blocks {
        match seen.get(&block.number) {
            Some(first) => {
                tracing::error!(
                    block_num = block.number,
                    block1 = %block,
                    block2 = %first,
                    block1_parent = %block.parent_id,
                    block2_parent = %first.parent_id,
                    "found duplicate block number in bundle"
                );
                found.push(DuplicateNumber {
                    number: block.number,
                    first,
                    duplicate: block,
                });
            }
            None => {
                seen.insert(block.number, block);
            }
        }
    }

    found
}

/// Report every block whose id was already seen earlier in `blocks`.
pub fn find_duplicate_ids(blocks: &[Block]) -> Vec<DuplicateId<'_>> {
    let mut seen: HashMap<&str, &Block> = HashMap::with_capacity(blocks.len());
    let mut found = Vec::new();

    for block in blocks {
        match seen.get(block.id.as_str()) {
            Some(first) => {
                tracing::error!(
                    block_id = %block.id,
                    block1 = %block,
                    block2 = %first,
                    "found duplicate block id in bundle"
                );
                found.push(DuplicateId {
                    id: &block.id,
                    first,
                    duplicate: block,
                });
            }
            None => {
                seen.insert(&block.id, block);
            }
        }
    }

    found
}
