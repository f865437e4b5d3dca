use std::fs;

use super::variant::Variant;
use crate::config::TemplateConfig;

pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// {} placeholders are filled in order; {{ and }} are literal braces.
const EN_ONLY: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{}</title></head>
<body>
<h1>{0}</h1>
<p class="date">{}</p>
<div class="body">{}</div>
</body></html>
"#;

const CN_ONLY: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><style>.body {{ white-space: pre-wrap; }}</style></head>
<body>
<h1 lang="zh">{}</h1>
<h2>{}</h2>
<p class="date">{}</p>
<div class="body" lang="zh">{}</div>
<hr>
<div class="body">{}</div>
</body></html>
"#;

const ENH_CNB: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><style>.body {{ white-space: pre-wrap; }}</style></head>
<body>
<h1>{}</h1>
<p class="date">{}</p>
<div class="body" lang="zh">{}</div>
<hr>
<div class="body">{}</div>
</body></html>
"#;

const CNH_ENB: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><style>.body {{ white-space: pre-wrap; }}</style></head>
<body>
<h1 lang="zh">{}</h1>
<h2>{}</h2>
<p class="date">{}</p>
<div class="body">{}</div>
</body></html>
"#;

/// One template per variant.
#[derive(Clone, Debug)]
pub struct Templates {
    en_only: String,
    cn_only: String,
    enh_cnb: String,
    cnh_enb: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            en_only: EN_ONLY.to_string(),
            cn_only: CN_ONLY.to_string(),
            enh_cnb: ENH_CNB.to_string(),
            cnh_enb: CNH_ENB.to_string(),
        }
    }
}

impl Templates {
    pub fn from_config(cfg: &TemplateConfig) -> Self {
        let base = Self::default();
        Self {
            en_only: resolve(cfg.en_only.as_deref(), base.en_only),
            cn_only: resolve(cfg.cn_only.as_deref(), base.cn_only),
            enh_cnb: resolve(cfg.enh_cnb.as_deref(), base.enh_cnb),
            cnh_enb: resolve(cfg.cnh_enb.as_deref(), base.cnh_enb),
        }
    }

    pub fn get(&self, variant: Variant) -> &str {
        match variant {
            Variant::EnOnly => &self.en_only,
            Variant::CnOnly => &self.cn_only,
            Variant::EnhCnb => &self.enh_cnb,
            Variant::CnhEnb => &self.cnh_enb,
        }
    }

    pub fn render(&self, variant: Variant, values: &[String]) -> String {
        render(self.get(variant), values)
    }
}

/// A readable file wins; otherwise the value itself is the template.
fn resolve(value: Option<&str>, fallback: String) -> String {
    match value {
        None => fallback,
        Some(v) => fs::read_to_string(v).unwrap_or_else(|_| v.to_string()),
    }
}

/// Fill positional placeholders. `{}` takes the next value, `{N}` takes value N.
/// Missing values render empty; unknown `{...}` sequences are copied through.
pub fn render(template: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(String::len).sum::<usize>());
    let mut next = 0usize;
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            match tail.find('}') {
                Some(close) => {
                    let inner = &tail[1..close];
                    if inner.is_empty() {
                        out.push_str(values.get(next).map(String::as_str).unwrap_or(""));
                        next += 1;
                    } else if let Ok(i) = inner.parse::<usize>() {
                        out.push_str(values.get(i).map(String::as_str).unwrap_or(""));
                    } else {
                        out.push_str(&tail[..=close]);
                    }
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vals(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn fills_placeholders_in_order() {
        assert_eq!(render("<h1>{}</h1><p>{}</p>", &vals(&["a", "b"])), "<h1>a</h1><p>b</p>");
    }

    #[test]
    fn escapes_and_indexed_placeholders() {
        assert_eq!(render("p {{ x: 1 }} {} {0}", &vals(&["t"])), "p { x: 1 } t t");
    }

    #[test]
    fn missing_values_render_empty() {
        assert_eq!(render("{}|{}|{}", &vals(&["only"])), "only||");
        assert_eq!(render("{name} {", &vals(&[])), "{name} {");
    }

    #[test]
    fn default_templates_take_their_field_counts() {
        let t = Templates::default();
        let cn = t.render(Variant::CnOnly, &vals(&["标题", "Title", "2020-01-01 00:00:00", "正文", "Body"]));
        assert!(cn.contains("<h1 lang=\"zh\">标题</h1>"));
        assert!(cn.contains("<h2>Title</h2>"));
        assert!(cn.contains("<div class=\"body\">Body</div>"));
        assert!(cn.contains(".body { white-space: pre-wrap; }"));

        let en = t.render(Variant::EnOnly, &vals(&["Head", "2020-01-01 00:00:00", "Text"]));
        assert!(en.contains("<title>Head</title>"));
        assert!(en.contains("<h1>Head</h1>"));
        assert!(en.contains("<div class=\"body\">Text</div>"));
    }

    #[test]
    fn literal_template_used_when_not_a_file() {
        let cfg = TemplateConfig { en_only: Some("{} @ {} :: {}".into()), ..Default::default() };
        let t = Templates::from_config(&cfg);
        assert_eq!(t.render(Variant::EnOnly, &vals(&["h", "d", "b"])), "h @ d :: b");
    }

    #[test]
    fn template_file_is_read() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"FILE {}").unwrap();
        let cfg = TemplateConfig { cnh_enb: Some(f.path().display().to_string()), ..Default::default() };
        let t = Templates::from_config(&cfg);
        assert_eq!(t.render(Variant::CnhEnb, &vals(&["x"])), "FILE x");
    }
}
