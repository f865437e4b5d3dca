use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Element path (local names) from the document root down to the content set.
const CONTENT_SET_PATH: [&[u8]; 4] = [b"newsMessage", b"itemSet", b"newsItem", b"contentSet"];

/// The two ways a story body can be carried inside a content set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Representation {
    /// `<inlineXML>`: body is embedded markup, kept verbatim.
    InlineXml,
    /// `<inlineData>`: body is character data, usually CDATA.
    InlineData,
}

impl Representation {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"inlineXML" => Some(Representation::InlineXml),
            b"inlineData" => Some(Representation::InlineData),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentNode {
    pub lang: Option<String>,
    pub text: String,
}

/// Whatever was found under `newsMessage/itemSet/newsItem/contentSet`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentSet {
    pub inline_xml: Option<ContentNode>,
    pub inline_data: Option<ContentNode>,
}

impl ContentSet {
    pub fn get(&self, repr: Representation) -> Option<&ContentNode> {
        match repr {
            Representation::InlineXml => self.inline_xml.as_ref(),
            Representation::InlineData => self.inline_data.as_ref(),
        }
    }

    fn slot(&mut self, repr: Representation) -> &mut Option<ContentNode> {
        match repr {
            Representation::InlineXml => &mut self.inline_xml,
            Representation::InlineData => &mut self.inline_data,
        }
    }
}

struct Capture {
    repr: Representation,
    depth: usize,
    start: usize,
    lang: Option<String>,
    text: String,
}

/// Walk the document once and pull out the first node of each representation.
pub fn parse_content_set(markup: &str) -> Result<ContentSet, quick_xml::Error> {
    let mut reader = Reader::from_str(markup);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut out = ContentSet::default();
    let mut active: Option<Capture> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if active.is_none() && at_content_set(&stack) {
                    if let Some(repr) = Representation::from_tag(&name) {
                        if out.get(repr).is_none() {
                            active = Some(Capture {
                                repr,
                                depth: stack.len(),
                                start: reader.buffer_position(),
                                lang: xml_lang(&e),
                                text: String::new(),
                            });
                        }
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if active.is_none() && at_content_set(&stack) {
                    if let Some(repr) = Representation::from_tag(e.local_name().as_ref()) {
                        let slot = out.slot(repr);
                        if slot.is_none() {
                            *slot = Some(ContentNode { lang: xml_lang(&e), text: String::new() });
                        }
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
                if let Some(cap) = active.take() {
                    if cap.depth == stack.len() {
                        let text = match cap.repr {
                            Representation::InlineXml => {
                                let end = reader.buffer_position();
                                let close = markup[..end].rfind("</").unwrap_or(end);
                                markup[cap.start..close].trim().to_string()
                            }
                            Representation::InlineData => cap.text.trim().to_string(),
                        };
                        *out.slot(cap.repr) = Some(ContentNode { lang: cap.lang, text });
                    } else {
                        active = Some(cap);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(cap) = active.as_mut().filter(|cap| cap.repr == Representation::InlineData) {
                    // unknown entities are kept as written
                    match t.unescape() {
                        Ok(s) => cap.text.push_str(&s),
                        Err(_) => cap.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(c) => {
                if let Some(cap) = active.as_mut().filter(|cap| cap.repr == Representation::InlineData) {
                    cap.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn at_content_set(stack: &[Vec<u8>]) -> bool {
    stack.len() == CONTENT_SET_PATH.len()
        && stack.iter().zip(CONTENT_SET_PATH.iter()).all(|(a, b)| a.as_slice() == *b)
}

fn xml_lang(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"xml:lang")
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}
