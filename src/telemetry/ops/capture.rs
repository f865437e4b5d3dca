use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Capture;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Connect, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Connect => "connect",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Connect => info_span!("connect"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Capture {
    const NAME: &'static str = "capture";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("capture") }
}
