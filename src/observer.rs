/// Notified whenever a question is answered with the fallback message.
///
/// Rejected questions are the raw material for growing the knowledge base,
/// so they are reported through this trait rather than dropped.
pub trait RejectionObserver: Send + Sync {
    /// `distance` is the squared L2 distance to the nearest entry, or
    /// infinity when there was no entry at all.
    fn on_unmatched(&self, question: &str, distance: f32);
}

/// Emits one `info` event per rejected question.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RejectionObserver for TracingObserver {
    fn on_unmatched(&self, question: &str, distance: f32) {
        tracing::info!(
            target: "askbert::unmatched",
            question,
            distance = format_args!("{distance:.4}"),
            "question not found in knowledge base"
        );
    }
}
