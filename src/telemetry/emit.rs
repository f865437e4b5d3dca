use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "wirefeed.v1";

#[derive(Debug, Clone, Serialize, Default)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'a str,
    pub apply: bool,
    pub body: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(op: &'a str, apply: bool, body: &'a T, meta: Option<Meta>) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply,
            body,
            meta,
        }
    }
}

pub fn write_envelope<T: Serialize, W: Write>(w: &mut W, env: &Envelope<'_, T>) -> Result<()> {
    serde_json::to_writer(&mut *w, env)?;
    writeln!(w)?;
    Ok(())
}

pub fn print_plan<T: Serialize>(op: &str, plan: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::new(op, false, plan, meta);
    write_envelope(&mut io::stdout().lock(), &env)
}

pub fn print_result<T: Serialize>(op: &str, result: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::new(op, true, result, meta);
    write_envelope(&mut io::stdout().lock(), &env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_plan_envelope() {
        let plan = json!({"files": 5});
        let env = Envelope::new("purge", false, &plan, None);
        let mut buf = Vec::new();
        write_envelope(&mut buf, &env).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("\"schema_version\":\"wirefeed.v1\""));
        assert!(s.contains("\"op\":\"purge\""));
        assert!(s.contains("\"apply\":false"));
        assert!(s.ends_with('\n'));
    }

    #[test]
    fn meta_is_omitted_when_absent() {
        let result = json!({"published": 3});
        let env = Envelope::new("stream", true, &result, None);
        let s = serde_json::to_string(&env).unwrap();
        assert!(!s.contains("\"meta\""));
        assert!(s.contains("\"published\":3"));
    }
}
