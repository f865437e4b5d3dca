use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Stream;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Connect, Reopen, Decode, Extract, Translate, Publish }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Connect => "connect",
        Phase::Reopen => "reopen",
        Phase::Decode => "decode",
        Phase::Extract => "extract",
        Phase::Translate => "translate",
        Phase::Publish => "publish",
    }}
    fn span(&self) -> Span { match self {
        Phase::Connect => info_span!("connect"),
        Phase::Reopen => info_span!("reopen"),
        Phase::Decode => info_span!("decode"),
        Phase::Extract => info_span!("extract"),
        Phase::Translate => info_span!("translate"),
        Phase::Publish => info_span!("publish"),
    }}
}

impl OpMarker for Stream {
    const NAME: &'static str = "stream";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("stream") }
}
