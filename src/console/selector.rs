// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Element selectors and their XPath rendering.

use std::fmt;

/// How to find an element on a console page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Element with an accessible role and name.
    Role {
        /// ARIA role, e.g. `button`.
        role: String,
        /// Accessible name.
        name: String,
    },
    /// Innermost element whose text equals or contains `text`.
    Text {
        /// Text to match.
        text: String,
        /// Match the whole text rather than a substring.
        exact: bool,
    },
    /// Element with an `id` attribute.
    Id(String),
    /// File input element.
    FileInput,
    /// `inner` resolved below `scope`.
    Within {
        /// Enclosing element.
        scope: Box<Selector>,
        /// Element inside the scope.
        inner: Box<Selector>,
    },
    /// First match of the inner selector in document order.
    First(Box<Selector>),
}

impl Selector {
    /// Element with `role` and accessible `name`.
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    /// Element whose whole text is `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
        }
    }

    /// Innermost element whose text contains `text`.
    pub fn text_containing(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Element with `id`.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Resolve `self` inside `scope`.
    pub fn within(self, scope: Selector) -> Self {
        Self::Within {
            scope: Box::new(scope),
            inner: Box::new(self),
        }
    }

    /// Keep only the first match.
    pub fn first(self) -> Self {
        Self::First(Box::new(self))
    }

    /// Render as an XPath 1.0 expression.
    pub fn to_xpath(&self) -> String {
        match self {
            Self::Role { role, name } => role_xpath(role, name),
            Self::Text { text, exact: true } => {
                format!("//*[normalize-space(text())={}]", literal(text))
            }
            Self::Text { text, exact: false } => {
                let t = literal(text);
                format!(
                    "//*[contains(normalize-space(.), {t}) and not(*[contains(normalize-space(.), {t})])]"
                )
            }
            Self::Id(id) => format!("//*[@id={}]", literal(id)),
            Self::FileInput => "//input[@type='file']".to_string(),
            Self::Within { scope, inner } => {
                let inner = inner.to_xpath();
                match inner.strip_prefix('(') {
                    // First(...) wraps its path in parentheses; scope the path inside.
                    Some(rest) => format!("({}{}", scope.to_xpath(), rest),
                    None => format!("{}{}", scope.to_xpath(), inner),
                }
            }
            Self::First(inner) => format!("({})[1]", inner.to_xpath()),
        }
    }
}

fn role_xpath(role: &str, name: &str) -> String {
    let n = literal(name);
    let name_match =
        format!("(normalize-space(.)={n} or @aria-label={n} or @title={n} or @placeholder={n})");

    let role_match = match role {
        "button" => "(self::button or @role='button' or self::input[@type='button' or @type='submit'])"
            .to_string(),
        "navigation" => "(self::nav or @role='navigation')".to_string(),
        "textbox" => "(self::textarea or @role='textbox' or self::input[not(@type) or @type='text' or @type='password' or @type='number' or @type='tel'])"
            .to_string(),
        "link" => "(self::a[@href] or @role='link')".to_string(),
        other => format!("@role={}", literal(other)),
    };

    format!("//*[{role_match} and {name_match}]")
}

/// Quote `value` as an XPath string literal.
fn literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name } => write!(f, "role={}[name={:?}]", role, name),
            Self::Text { text, exact: true } => write!(f, "text={:?}", text),
            Self::Text { text, exact: false } => write!(f, "text~={:?}", text),
            Self::Id(id) => write!(f, "#{}", id),
            Self::FileInput => write!(f, "input[type=file]"),
            Self::Within { scope, inner } => write!(f, "{} >> {}", scope, inner),
            Self::First(inner) => write!(f, "{} >> nth=0", inner),
        }
    }
}
