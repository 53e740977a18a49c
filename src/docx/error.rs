use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocxError {
    #[error("not a valid document archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document has no {0} part")]
    MissingPart(&'static str),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("bad attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("malformed part: {0}")]
    Malformed(String),

    #[error("part is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("failed to repackage document: {0}")]
    Packaging(String),
}
