use std::path::PathBuf;

use crate::report::BatchSummary;

/// Progress notifications emitted by a running batch or file job, in
/// processing order.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Matching input files, after sorting
    FilesFound { total: usize },
    FileStarted {
        path: PathBuf,
        index: usize,
        total: usize,
    },
    ChannelsDetected { path: PathBuf, channels: u32 },
    ChannelFinished {
        path: PathBuf,
        channel_index: u32,
        output: PathBuf,
        success: bool,
        metadata_preserved: bool,
    },
    /// Monotonic progress over all units of work (files in a batch, channels
    /// in a single-file run)
    Progress { completed: usize, total: usize },
    /// A non-fatal problem worth surfacing
    Warning { message: String },
    Finished(Box<BatchSummary>),
}

impl PipelineEvent {
    /// Progress as a whole percentage, if this is a progress event.
    pub fn percent(&self) -> Option<u8> {
        match self {
            PipelineEvent::Progress { completed, total } if *total > 0 => {
                Some(((*completed).min(*total) * 100 / *total) as u8)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineEvent;

    #[test]
    fn percent_rounds_down_and_clamps() {
        let event = PipelineEvent::Progress {
            completed: 1,
            total: 3,
        };
        assert_eq!(event.percent(), Some(33));
        let done = PipelineEvent::Progress {
            completed: 5,
            total: 3,
        };
        assert_eq!(done.percent(), Some(100));
        let empty = PipelineEvent::Progress {
            completed: 0,
            total: 0,
        };
        assert_eq!(empty.percent(), None);
    }
}
