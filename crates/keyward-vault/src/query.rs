//! Backend filter vocabulary.
//!
//! The backend is addressed by a filter built from a fixed set of attribute
//! keys: item class, account, server, port, label, payload, match limit and
//! the return flags. [`Attributes`] carries the four identity attributes and
//! plays three roles:
//!
//! - in a [`Query`], a `None` attribute places no constraint on the match;
//! - in [`Changes`], a `None` attribute is left untouched;
//! - on an [`Item`], it is whatever the backend reported.

use std::fmt;

// ---------------------------------------------------------------------------
// Item class
// ---------------------------------------------------------------------------

/// The two record classes the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemClass {
    /// Network-scoped password (account + server + port + label).
    InternetPassword,
    /// Account-scoped password (account + label).
    GenericPassword,
}

impl ItemClass {
    /// Short tag used in persisted rows and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternetPassword => "inet",
            Self::GenericPassword => "genp",
        }
    }

    /// Parse the tag written by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inet" => Some(Self::InternetPassword),
            "genp" => Some(Self::GenericPassword),
            _ => None,
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Identity attributes of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub account: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub label: Option<String>,
}

impl Attributes {
    /// Whether `stored` satisfies every constraint present on `self`.
    ///
    /// Absent constraints match anything, including an absent stored value.
    pub fn matches(&self, stored: &Attributes) -> bool {
        fn field<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            match want {
                None => true,
                Some(w) => have.as_ref() == Some(w),
            }
        }

        field(&self.account, &stored.account)
            && field(&self.server, &stored.server)
            && field(&self.port, &stored.port)
            && field(&self.label, &stored.label)
    }

    /// Overwrite the fields named by `patch`, keeping all others.
    pub fn apply(&mut self, patch: &Attributes) {
        if let Some(account) = &patch.account {
            self.account = Some(account.clone());
        }
        if let Some(server) = &patch.server {
            self.server = Some(server.clone());
        }
        if let Some(port) = patch.port {
            self.port = Some(port);
        }
        if let Some(label) = &patch.label {
            self.label = Some(label.clone());
        }
    }

    /// True when `server` or `port` is set; those only exist on internet items.
    pub(crate) fn has_network_fields(&self) -> bool {
        self.server.is_some() || self.port.is_some()
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// How many records a query may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchLimit {
    #[default]
    One,
    All,
}

impl MatchLimit {
    /// The cap as a count, `None` meaning unbounded.
    pub fn cap(&self) -> Option<usize> {
        match self {
            Self::One => Some(1),
            Self::All => None,
        }
    }
}

/// A backend filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub class: ItemClass,
    pub attributes: Attributes,
    pub limit: MatchLimit,
    pub return_attributes: bool,
    pub return_data: bool,
}

impl Query {
    /// An unconstrained query over `class`, limited to one record, returning
    /// nothing but the match itself.
    pub fn new(class: ItemClass) -> Self {
        Self {
            class,
            attributes: Attributes::default(),
            limit: MatchLimit::One,
            return_attributes: false,
            return_data: false,
        }
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.attributes.account = Some(account.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.attributes.server = Some(server.into());
        self
    }

    /// Constrain the port when one is supplied.
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.attributes.port = port;
        self
    }

    /// Constrain the label when one is supplied.
    pub fn label(mut self, label: Option<&str>) -> Self {
        self.attributes.label = label.map(str::to_owned);
        self
    }

    pub fn limit(mut self, limit: MatchLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Ask the backend to return the stored attributes and secret payload.
    pub fn returning_all(mut self) -> Self {
        self.return_attributes = true;
        self.return_data = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Changes and items
// ---------------------------------------------------------------------------

/// A sparse patch applied by [`SecureBackend::update`](crate::SecureBackend::update).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub attributes: Attributes,
    pub data: Option<Vec<u8>>,
}

/// A record as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub class: ItemClass,
    pub attributes: Attributes,
    /// Present only when the query asked for data.
    pub data: Option<Vec<u8>>,
}

impl Item {
    /// Trim the item down to what `query` asked to be returned.
    pub(crate) fn project(&self, query: &Query) -> Item {
        Item {
            class: self.class,
            attributes: if query.return_attributes {
                self.attributes.clone()
            } else {
                Attributes::default()
            },
            data: if query.return_data {
                self.data.clone()
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> Attributes {
        Attributes {
            account: Some("alice".into()),
            server: Some("example.com".into()),
            port: Some(100),
            label: Some(String::new()),
        }
    }

    #[test]
    fn omitted_fields_do_not_constrain() {
        let filter = Query::new(ItemClass::InternetPassword)
            .account("alice")
            .server("example.com");
        assert!(filter.attributes.matches(&stored()));
    }

    #[test]
    fn explicit_fields_must_match_exactly() {
        let right_port = Query::new(ItemClass::InternetPassword)
            .account("alice")
            .port(Some(100));
        let wrong_port = Query::new(ItemClass::InternetPassword)
            .account("alice")
            .port(Some(101));
        assert!(right_port.attributes.matches(&stored()));
        assert!(!wrong_port.attributes.matches(&stored()));

        let labelled = Query::new(ItemClass::InternetPassword).label(Some("work"));
        assert!(!labelled.attributes.matches(&stored()));
    }

    #[test]
    fn constraint_on_missing_stored_value_fails() {
        let filter = Attributes {
            server: Some("example.com".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&Attributes::default()));
    }

    #[test]
    fn apply_only_touches_named_fields() {
        let mut attrs = stored();
        attrs.apply(&Attributes {
            server: Some("other.org".into()),
            ..Default::default()
        });
        assert_eq!(attrs.server.as_deref(), Some("other.org"));
        assert_eq!(attrs.account.as_deref(), Some("alice"));
        assert_eq!(attrs.port, Some(100));
        assert_eq!(attrs.label.as_deref(), Some(""));
    }

    #[test]
    fn projection_respects_return_flags() {
        let item = Item {
            class: ItemClass::GenericPassword,
            attributes: stored(),
            data: Some(b"pw".to_vec()),
        };

        let bare = item.project(&Query::new(ItemClass::GenericPassword));
        assert_eq!(bare.attributes, Attributes::default());
        assert!(bare.data.is_none());

        let full = item.project(&Query::new(ItemClass::GenericPassword).returning_all());
        assert_eq!(full, item);
    }

    #[test]
    fn class_tags_round_trip() {
        for class in [ItemClass::InternetPassword, ItemClass::GenericPassword] {
            assert_eq!(ItemClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(ItemClass::parse("cert"), None);
    }

    #[test]
    fn match_limit_caps() {
        assert_eq!(MatchLimit::One.cap(), Some(1));
        assert_eq!(MatchLimit::All.cap(), None);
        assert_eq!(MatchLimit::default(), MatchLimit::One);
    }
}
