pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

pub fn stream() -> LogCtx<ops::stream::Stream> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn capture() -> LogCtx<ops::capture::Capture> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn purge() -> LogCtx<ops::purge::Purge> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
