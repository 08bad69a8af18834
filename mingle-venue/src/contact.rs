use url::Url;

/// Produces the link two matched guests use to reach each other.
pub trait ContactLinkBuilder: Send + Sync {
    fn build(&self, message: &str, phone_number: Option<&str>) -> String;
}

/// `wa.me` style chat links: `<base>/<digits>?text=<message>`, or
/// `<base>/?text=<message>` when no usable number is known.
#[derive(Debug, Clone)]
pub struct ChatLinkBuilder {
    base: Url,
}

impl ChatLinkBuilder {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        Ok(Self { base })
    }
}

/// Keeps the digits of a phone number: `+33 6 12-34` becomes `3361234`.
/// `None` when nothing dialable is left.
fn dialable(phone_number: &str) -> Option<String> {
    let digits: String = phone_number.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

impl ContactLinkBuilder for ChatLinkBuilder {
    fn build(&self, message: &str, phone_number: Option<&str>) -> String {
        let mut url = self.base.clone();
        let path = phone_number.and_then(dialable).unwrap_or_default();
        url.set_path(&path);
        url.set_query(None);
        if !message.is_empty() {
            url.query_pairs_mut().append_pair("text", message);
        }
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_message_are_encoded() {
        let builder = ChatLinkBuilder::new("https://wa.me").unwrap();
        let link = builder.build("We matched at the bar!", Some("+33 6 12-34-56-78"));
        assert_eq!(link, "https://wa.me/33612345678?text=We+matched+at+the+bar%21");
    }

    #[test]
    fn missing_number_keeps_bare_link() {
        let builder = ChatLinkBuilder::new("https://wa.me").unwrap();
        assert_eq!(builder.build("hi", None), "https://wa.me/?text=hi");
        assert_eq!(builder.build("hi", Some("n/a")), "https://wa.me/?text=hi");
    }

    #[test]
    fn base_must_be_absolute() {
        assert!(ChatLinkBuilder::new("wa.me").is_err());
        assert!(ChatLinkBuilder::new("mailto:someone@example.com").is_err());
    }
}
