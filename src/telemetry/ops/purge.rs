use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Purge;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Scan, Delete }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Scan => "scan",
        Phase::Delete => "delete",
    }}
    fn span(&self) -> Span { match self {
        Phase::Scan => info_span!("scan"),
        Phase::Delete => info_span!("delete"),
    }}
}

impl OpMarker for Purge {
    const NAME: &'static str = "purge";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("purge") }
}
