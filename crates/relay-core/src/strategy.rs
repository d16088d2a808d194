//! Inline vs. staged upload selection.
//!
//! Inline uploads embed the file as base64 in the job-creation request, which
//! inflates it by a third and buffers it in memory. Above the threshold the
//! job is created first and the file is streamed from disk to the
//! provider-issued upload target instead.

use strum::Display;

pub const MIB: u64 = 1024 * 1024;

/// Default inline ceiling: 200 MiB.
pub const DEFAULT_INLINE_THRESHOLD: u64 = 200 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum UploadStrategy {
    Inline,
    Staged,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    /// Largest file, in bytes, that is still sent inline.
    pub inline_threshold: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }
}

impl UploadPolicy {
    pub fn new(inline_threshold: u64) -> Self {
        Self { inline_threshold }
    }

    pub fn select(&self, size: u64) -> UploadStrategy {
        if size > self.inline_threshold {
            UploadStrategy::Staged
        } else {
            UploadStrategy::Inline
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_files_go_inline() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.select(0), UploadStrategy::Inline);
        assert_eq!(policy.select(5 * MIB), UploadStrategy::Inline);
    }

    #[test]
    fn threshold_itself_is_inline() {
        let policy = UploadPolicy::new(1024);
        assert_eq!(policy.select(1024), UploadStrategy::Inline);
        assert_eq!(policy.select(1025), UploadStrategy::Staged);
    }

    #[test]
    fn default_threshold_is_200_mib() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.select(200 * MIB + 1), UploadStrategy::Staged);
    }

    #[test]
    fn strategy_displays_lowercase() {
        assert_eq!(UploadStrategy::Inline.to_string(), "inline");
        assert_eq!(UploadStrategy::Staged.to_string(), "staged");
    }
}
