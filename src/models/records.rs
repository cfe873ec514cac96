//! Typed records parsed out of a completed [`ResponseEnvelope`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::client::{Error, RecordContainer, ResponseEnvelope, Result};

/// Converts the record container of an envelope into domain records
pub trait RecordParser {
    type Record;

    /// Parse every record of `envelope`, in order
    fn parse(envelope: &ResponseEnvelope) -> Result<Vec<Self::Record>>;
}

/// Accept a string, number or boolean where the API is inconsistent
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Author of a metadata record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Creator {
    pub creator: Option<String>,
    #[serde(rename = "ORCID")]
    pub orcid: Option<String>,
}

/// Link to a representation of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordUrl {
    pub format: Option<String>,
    pub platform: Option<String>,
    pub value: Option<String>,
}

/// One record of the metadata endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataRecord {
    pub content_type: Option<String>,
    pub identifier: Option<String>,
    pub language: Option<String>,
    pub url: Vec<RecordUrl>,
    pub title: Option<String>,
    pub creators: Vec<Creator>,
    pub publication_name: Option<String>,
    #[serde(rename = "openaccess", deserialize_with = "lenient_string")]
    pub open_access: Option<String>,
    pub doi: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub publication_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub issn: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub volume: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub starting_page: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub ending_page: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub journal_id: Option<String>,
    pub copyright: Option<String>,
    /// Plain text on the metadata endpoint, structured on meta
    #[serde(rename = "abstract")]
    pub abstract_text: Option<Value>,
    pub subjects: Vec<String>,
}

impl MetadataRecord {
    /// Whether the record is flagged open access
    pub fn is_open_access(&self) -> bool {
        self.open_access
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
    }

    /// First URL of the record
    pub fn primary_url(&self) -> Option<&str> {
        self.url.first().and_then(|u| u.value.as_deref())
    }
}

/// Overview of a metadata query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub total: u64,
    pub start: u64,
    pub page_length: u64,
    pub records_retrieved: u64,
}

/// One value count of a facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub facet: String,
    pub value: String,
    pub count: u64,
}

/// Parser for the JSON endpoints
pub struct MetadataRecords;

impl MetadataRecords {
    /// Summary of the first page; `requested` caps the retrieved count
    pub fn summary(envelope: &ResponseEnvelope, requested: u64) -> Result<ResultSummary> {
        let total = envelope.total_available()?;
        let result = envelope
            .json()
            .and_then(|json| json.pointer("/result/0"))
            .cloned()
            .unwrap_or(Value::Null);
        let field = |name: &str| match result.get(name) {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        };

        Ok(ResultSummary {
            total,
            start: field("start"),
            page_length: field("pageLength"),
            records_retrieved: requested.min(total),
        })
    }

    /// Faceted counts of the results
    pub fn facets(envelope: &ResponseEnvelope) -> Vec<Facet> {
        let Some(Value::Array(facets)) = envelope.json().and_then(|json| json.get("facets")) else {
            return Vec::new();
        };

        facets
            .iter()
            .flat_map(|facet| {
                let name = facet["name"].as_str().unwrap_or_default().to_string();
                facet["values"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(move |item| Facet {
                        facet: name.clone(),
                        value: item["value"].as_str().unwrap_or_default().to_string(),
                        count: match &item["count"] {
                            Value::String(s) => s.parse().unwrap_or(0),
                            other => other.as_u64().unwrap_or(0),
                        },
                    })
            })
            .collect()
    }
}

impl RecordParser for MetadataRecords {
    type Record = MetadataRecord;

    fn parse(envelope: &ResponseEnvelope) -> Result<Vec<MetadataRecord>> {
        match envelope.record_container()? {
            RecordContainer::Json(records) => records
                .iter()
                .map(|record| MetadataRecord::deserialize(record).map_err(Error::from))
                .collect(),
            RecordContainer::Xml(_) => Err(Error::Parse(
                "metadata records must come from a JSON response".to_string(),
            )),
        }
    }
}

/// Accept a single string or a list of strings
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Subject classification of a meta record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Discipline {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub term: Option<String>,
}

/// One record of the meta v2 endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetaRecord {
    #[serde(flatten)]
    pub record: MetadataRecord,
    #[serde(deserialize_with = "lenient_string")]
    pub e_issn: Option<String>,
    pub online_date: Option<String>,
    pub issue_type: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub topical_collection: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub genre: Vec<String>,
    /// Conference details, kept as returned
    pub conference_info: Option<Value>,
    #[serde(deserialize_with = "string_or_list")]
    pub keyword: Vec<String>,
    pub disciplines: Vec<Discipline>,
}

impl std::ops::Deref for MetaRecord {
    type Target = MetadataRecord;

    fn deref(&self) -> &MetadataRecord {
        &self.record
    }
}

/// Parser for the meta v2 endpoint
///
/// Summary and facets have the same shape as on the metadata endpoint; see
/// [`MetadataRecords::summary`] and [`MetadataRecords::facets`].
pub struct MetaRecords;

impl RecordParser for MetaRecords {
    type Record = MetaRecord;

    fn parse(envelope: &ResponseEnvelope) -> Result<Vec<MetaRecord>> {
        match envelope.record_container()? {
            RecordContainer::Json(records) => records
                .iter()
                .map(|record| MetaRecord::deserialize(record).map_err(Error::from))
                .collect(),
            RecordContainer::Xml(_) => Err(Error::Parse(
                "meta records must come from a JSON response".to_string(),
            )),
        }
    }
}

/// Paragraph of an open access document with its enclosing section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub id: String,
    pub section_id: Option<String>,
    pub section_title: Option<String>,
    pub text: String,
}

/// Journal article from the open access endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Article {
    pub doi: Option<String>,
    pub title: Option<String>,
    pub article_type: Option<String>,
    pub language: Option<String>,
    pub publisher_id: Option<String>,
    pub manuscript: Option<String>,
    pub journal_title: Option<String>,
    pub journal_abbrev_title: Option<String>,
    pub journal_doi: Option<String>,
    pub journal_publisher_id: Option<String>,
    pub issn_print: Option<String>,
    pub issn_electronic: Option<String>,
    pub publisher_name: Option<String>,
    pub publisher_loc: Option<String>,
    pub paragraphs: Vec<Paragraph>,
}

/// Book chapter from the open access endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub doi: Option<String>,
    pub title: Option<String>,
    /// Chapter number or name as printed
    pub chapter_nr: Option<String>,
    pub book_doi: Option<String>,
    pub book_title: Option<String>,
    pub book_sub_title: Option<String>,
    pub book_title_id: Option<String>,
    pub book_pub_date: Option<String>,
    pub isbn_print: Option<String>,
    pub isbn_electronic: Option<String>,
    pub publisher_id: Option<String>,
    pub publisher_name: Option<String>,
    pub publisher_loc: Option<String>,
    pub paragraphs: Vec<Paragraph>,
}

/// One open access document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OpenAccessDocument {
    Article(Article),
    Chapter(Chapter),
}

impl OpenAccessDocument {
    pub fn doi(&self) -> Option<&str> {
        match self {
            OpenAccessDocument::Article(a) => a.doi.as_deref(),
            OpenAccessDocument::Chapter(c) => c.doi.as_deref(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            OpenAccessDocument::Article(a) => a.title.as_deref(),
            OpenAccessDocument::Chapter(c) => c.title.as_deref(),
        }
    }

    /// Full text, paragraph by paragraph
    pub fn paragraphs(&self) -> &[Paragraph] {
        match self {
            OpenAccessDocument::Article(a) => &a.paragraphs,
            OpenAccessDocument::Chapter(c) => &c.paragraphs,
        }
    }
}

/// Parser for the JATS endpoint
pub struct OpenAccessRecords;

impl RecordParser for OpenAccessRecords {
    type Record = OpenAccessDocument;

    fn parse(envelope: &ResponseEnvelope) -> Result<Vec<OpenAccessDocument>> {
        match envelope.record_container()? {
            RecordContainer::Xml(fragments) => fragments.iter().map(|f| parse_document(f)).collect(),
            RecordContainer::Json(_) => Err(Error::Parse(
                "open access records must come from an XML response".to_string(),
            )),
        }
    }
}

/// Element of a fragment with the text of all its descendants
struct Node {
    parent: Option<usize>,
    path: Vec<String>,
    attributes: Vec<(String, String)>,
    text: String,
}

impl Node {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    fn within(&self, ancestor: &str) -> bool {
        self.path[..self.path.len().saturating_sub(1)]
            .iter()
            .any(|name| name == ancestor)
    }

    fn has_attribute(&self, name: &str, value: &str) -> bool {
        self.attribute(name) == Some(value)
    }

    fn value(&self) -> Option<String> {
        let text = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    }
}

fn parse_document(fragment: &str) -> Result<OpenAccessDocument> {
    let nodes = collect_nodes(fragment)?;
    let root = nodes
        .first()
        .ok_or_else(|| Error::Parse("XML: empty record".to_string()))?;

    match root.name() {
        "article" => Ok(OpenAccessDocument::Article(parse_article(root, &nodes))),
        "book-part-wrapper" => Ok(OpenAccessDocument::Chapter(parse_chapter(&nodes))),
        other => Err(Error::Parse(format!(
            "XML: unsupported open access record <{}>",
            other
        ))),
    }
}

fn parse_article(root: &Node, nodes: &[Node]) -> Article {
    let article_id = |kind: &str| {
        find(nodes, |n| {
            n.name() == "article-id" && n.within("article-meta") && n.has_attribute("pub-id-type", kind)
        })
    };
    let journal = |name: &str| find(nodes, |n| n.name() == name && n.within("journal-meta"));
    let journal_id = |kind: &str| {
        find(nodes, |n| {
            n.name() == "journal-id"
                && n.within("journal-meta")
                && n.has_attribute("journal-id-type", kind)
        })
    };
    let issn = |kind: &str| {
        find(nodes, |n| {
            n.name() == "issn" && n.within("journal-meta") && n.has_attribute("pub-type", kind)
        })
    };

    Article {
        doi: article_id("doi"),
        title: find(nodes, |n| {
            n.name() == "article-title" && n.within("title-group") && n.within("article-meta")
        }),
        article_type: root.attribute("article-type").map(str::to_string),
        language: root.attribute("xml:lang").map(str::to_string),
        publisher_id: article_id("publisher-id"),
        manuscript: article_id("manuscript"),
        journal_title: journal("journal-title"),
        journal_abbrev_title: journal("abbrev-journal-title"),
        journal_doi: journal_id("doi"),
        journal_publisher_id: journal_id("publisher-id"),
        issn_print: issn("ppub"),
        issn_electronic: issn("epub"),
        publisher_name: journal("publisher-name"),
        publisher_loc: journal("publisher-loc"),
        paragraphs: paragraphs(nodes),
    }
}

fn parse_chapter(nodes: &[Node]) -> Chapter {
    let book = |name: &str| find(nodes, |n| n.name() == name && n.within("book-meta"));
    let book_id = |kind: &str| {
        find(nodes, |n| {
            n.name() == "book-id" && n.within("book-meta") && n.has_attribute("book-id-type", kind)
        })
    };
    let part_id = |kind: &str| {
        find(nodes, |n| {
            n.name() == "book-part-id"
                && n.within("book-part-meta")
                && n.has_attribute("book-part-id-type", kind)
        })
    };
    let isbn = |kind: &str| {
        find(nodes, |n| {
            n.name() == "isbn" && n.within("book-meta") && n.has_attribute("content-type", kind)
        })
    };
    let publisher = |name: &str| {
        find(nodes, |n| {
            n.name() == name && n.within("book-meta") && n.within("publisher")
        })
    };

    Chapter {
        doi: part_id("doi"),
        title: find(nodes, |n| {
            n.name() == "title" && n.within("title-group") && n.within("book-part-meta")
        }),
        chapter_nr: part_id("chapter"),
        book_doi: book_id("doi"),
        book_title: find(nodes, |n| n.name() == "book-title" && n.within("book-title-group")),
        book_sub_title: find(nodes, |n| n.name() == "subtitle" && n.within("book-title-group")),
        book_title_id: book_id("book-title-id"),
        book_pub_date: find(nodes, |n| {
            n.name() == "string-date"
                && n.within("book-meta")
                && n.parent.is_some_and(|p| {
                    nodes[p].name() == "pub-date" && nodes[p].has_attribute("date-type", "pub")
                })
        }),
        isbn_print: isbn("ppub"),
        isbn_electronic: isbn("epub"),
        publisher_id: book_id("publisher-id"),
        publisher_name: publisher("publisher-name"),
        publisher_loc: publisher("publisher-loc"),
        paragraphs: paragraphs(nodes),
    }
}

/// Every `p` carrying an `id`, with the id and title of its parent element
fn paragraphs(nodes: &[Node]) -> Vec<Paragraph> {
    nodes
        .iter()
        .filter(|n| n.name() == "p")
        .filter_map(|n| {
            let id = n.attribute("id")?.to_string();
            let (section_id, section_title) = match n.parent {
                Some(parent) => (
                    nodes[parent].attribute("id").map(str::to_string),
                    nodes
                        .iter()
                        .find(|c| c.parent == Some(parent) && c.name() == "title")
                        .and_then(Node::value),
                ),
                None => (None, None),
            };
            Some(Paragraph {
                id,
                section_id,
                section_title,
                text: n.text.trim().to_string(),
            })
        })
        .collect()
}

fn find(nodes: &[Node], predicate: impl Fn(&Node) -> bool) -> Option<String> {
    nodes.iter().find(|&n| predicate(n)).and_then(Node::value)
}

fn open_node(nodes: &mut Vec<Node>, stack: &[usize], e: &BytesStart<'_>) -> Result<usize> {
    let mut path: Vec<String> = stack
        .last()
        .map(|&parent| nodes[parent].path.clone())
        .unwrap_or_default();
    path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());

    let mut attributes = Vec::new();
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| Error::Parse(format!("XML: {}", err)))?;
        attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            attribute.unescape_value()?.into_owned(),
        ));
    }

    nodes.push(Node {
        parent: stack.last().copied(),
        path,
        attributes,
        text: String::new(),
    });
    Ok(nodes.len() - 1)
}

fn collect_nodes(fragment: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(fragment);
    let mut nodes: Vec<Node> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let index = open_node(&mut nodes, &stack, &e)?;
                stack.push(index);
            }
            Event::Empty(e) => {
                open_node(&mut nodes, &stack, &e)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                for &index in &stack {
                    nodes[index].text.push_str(&text);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                for &index in &stack {
                    nodes[index].text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(nodes)
}
