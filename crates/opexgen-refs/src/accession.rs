//! Monotonic accession numbering.

use opexgen_core::NodeKind;

use crate::mode::{AccessionConfig, AccessionScope};

/// Sentinel given to directories outside the accession scope.
pub const DIR_SENTINEL: &str = "-Dir";

/// Sentinel given to files outside the accession scope.
pub const FILE_SENTINEL: &str = "-File";

/// Hands out accession references in visit order.
///
/// The counter never resets and never reuses a number; nodes outside the
/// scope get a fixed sentinel without consuming one.
#[derive(Debug, Clone)]
pub struct AccessionCounter<'a> {
    config: &'a AccessionConfig,
    next: u64,
}

impl<'a> AccessionCounter<'a> {
    /// Start counting at the configured `start_ref`.
    pub fn new(config: &'a AccessionConfig) -> Self {
        Self {
            config,
            next: config.start_ref,
        }
    }

    /// Whether a node kind consumes a number.
    pub fn in_scope(&self, kind: NodeKind) -> bool {
        match self.config.scope {
            AccessionScope::Both => true,
            AccessionScope::File => kind.is_file(),
            AccessionScope::Directory => kind.is_dir(),
        }
    }

    /// Reference for the next visited node.
    pub fn assign(&mut self, kind: NodeKind) -> String {
        if !self.in_scope(kind) {
            return match kind {
                NodeKind::Directory => DIR_SENTINEL.to_string(),
                NodeKind::File => FILE_SENTINEL.to_string(),
            };
        }
        let reference = self.config.format(self.next);
        self.next += 1;
        reference
    }

    /// Number the next in-scope node will receive.
    pub fn peek(&self) -> u64 {
        self.next
    }
}
