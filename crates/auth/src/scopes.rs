// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static registry mapping logical service names to OAuth scopes.
//!
//! Resolution ([`scopes_for_services`]) never fails: unknown names contribute
//! nothing. Validation ([`validate_services`]) reports those same unknown
//! names back to the caller. Keep the two separate.

use std::collections::HashSet;
use std::fmt;

/// Scope granted to every login regardless of requested services.
pub const BASELINE_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// Name reported by [`service_for_scope`] for [`BASELINE_SCOPE`].
/// Not a selectable service.
pub const BASELINE_SERVICE: &str = "identity";

const GMAIL_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
const GMAIL_SETTINGS: &str = "https://www.googleapis.com/auth/gmail.settings.basic";
const CALENDAR: &str = "https://www.googleapis.com/auth/calendar";
const DRIVE: &str = "https://www.googleapis.com/auth/drive";
const DOCUMENTS: &str = "https://www.googleapis.com/auth/documents";
const SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";
const PRESENTATIONS: &str = "https://www.googleapis.com/auth/presentations";
const CHAT_MESSAGES: &str = "https://www.googleapis.com/auth/chat.messages";
const CHAT_SPACES: &str = "https://www.googleapis.com/auth/chat.spaces";
const TASKS: &str = "https://www.googleapis.com/auth/tasks";
const CONTACTS: &str = "https://www.googleapis.com/auth/contacts";
const FORMS: &str = "https://www.googleapis.com/auth/forms.body";
const FORMS_RESPONSES: &str = "https://www.googleapis.com/auth/forms.responses.readonly";

/// A registered service and the scopes it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub name: &'static str,
    pub description: &'static str,
    pub scopes: &'static [&'static str],
}

/// Every registered service, in display order.
///
/// Editor services share the drive scope so that files they create can be
/// listed and moved.
pub const SERVICES: &[Service] = &[
    Service { name: "gmail", description: "Mail", scopes: &[GMAIL_MODIFY, GMAIL_SETTINGS] },
    Service { name: "calendar", description: "Calendar events", scopes: &[CALENDAR] },
    Service { name: "drive", description: "File storage", scopes: &[DRIVE] },
    Service { name: "docs", description: "Documents", scopes: &[DOCUMENTS, DRIVE] },
    Service { name: "sheets", description: "Spreadsheets", scopes: &[SPREADSHEETS, DRIVE] },
    Service { name: "slides", description: "Presentations", scopes: &[PRESENTATIONS, DRIVE] },
    Service { name: "chat", description: "Messaging", scopes: &[CHAT_MESSAGES, CHAT_SPACES] },
    Service { name: "tasks", description: "Task lists", scopes: &[TASKS] },
    Service { name: "contacts", description: "Contacts", scopes: &[CONTACTS] },
    Service { name: "forms", description: "Forms", scopes: &[FORMS, FORMS_RESPONSES] },
];

/// Flat enumeration of every service scope, in canonical order.
///
/// Must equal the union of all `SERVICES[..].scopes` with no duplicates.
pub const ALL_SCOPES: &[&str] = &[
    GMAIL_MODIFY,
    GMAIL_SETTINGS,
    CALENDAR,
    DRIVE,
    DOCUMENTS,
    SPREADSHEETS,
    PRESENTATIONS,
    CHAT_MESSAGES,
    CHAT_SPACES,
    TASKS,
    CONTACTS,
    FORMS,
    FORMS_RESPONSES,
];

/// A deduplicated set of scopes kept in canonical order: the baseline scope
/// first, then [`ALL_SCOPES`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet(Vec<&'static str>);

impl ScopeSet {
    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(&scope)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Space-separated form used in the OAuth `scope` parameter.
    pub fn to_param(&self) -> String {
        self.0.join(" ")
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

/// Look up a registered service by name.
pub fn service(name: &str) -> Option<&'static Service> {
    SERVICES.iter().find(|s| s.name == name)
}

/// Union of the named services' scopes plus [`BASELINE_SCOPE`].
///
/// Unknown names are ignored. The result is never empty.
pub fn scopes_for_services<S: AsRef<str>>(names: &[S]) -> ScopeSet {
    let wanted: HashSet<&'static str> = names
        .iter()
        .filter_map(|n| service(n.as_ref()))
        .flat_map(|s| s.scopes.iter().copied())
        .collect();

    let mut scopes = Vec::with_capacity(wanted.len() + 1);
    scopes.push(BASELINE_SCOPE);
    scopes.extend(ALL_SCOPES.iter().copied().filter(|s| wanted.contains(s)));
    ScopeSet(scopes)
}

/// Reverse lookup: the first registered service that lists `scope`.
///
/// The baseline scope maps to [`BASELINE_SERVICE`]; anything unregistered
/// returns `None`.
pub fn service_for_scope(scope: &str) -> Option<&'static str> {
    if scope == BASELINE_SCOPE {
        return Some(BASELINE_SERVICE);
    }
    SERVICES.iter().find(|s| s.scopes.contains(&scope)).map(|s| s.name)
}

/// Names from `names` that are not registered, in input order, duplicates
/// included.
pub fn validate_services<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|n| service(n).is_none())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "scopes_tests.rs"]
mod tests;
