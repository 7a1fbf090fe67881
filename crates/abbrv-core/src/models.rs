use crate::config::{ABBREVIATION_MAX_LEN, ALPHABET_SIZE, EXPANSION_MAX_LEN};
use crate::error::{AbbrvError, Result};

/// One abbreviation and the text it expands to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub abbreviation: String,
    pub expansion: String,
    pub multiline: bool,
    /// Masks the expansion when listing (passwords, addresses).
    pub hidden: bool,
}

impl Entry {
    pub fn new(abbreviation: impl Into<String>, expansion: impl Into<String>) -> Self {
        Self {
            abbreviation: abbreviation.into(),
            expansion: expansion.into(),
            multiline: false,
            hidden: false,
        }
    }

    pub fn multiline(mut self, multiline: bool) -> Self {
        self.multiline = multiline;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Number of backspaces needed to erase the typed abbreviation.
    pub fn abbreviation_len(&self) -> usize {
        self.abbreviation.chars().count()
    }

    /// Expansion as it should be shown to the user.
    pub fn display_expansion(&self) -> String {
        if self.hidden {
            "*".repeat(self.expansion.chars().count().min(8))
        } else {
            self.expansion.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_abbreviation(&self.abbreviation)?;
        validate_expansion(&self.expansion)
    }
}

pub fn validate_abbreviation(abbreviation: &str) -> Result<()> {
    let invalid = |reason| AbbrvError::InvalidAbbreviation {
        abbreviation: abbreviation.to_string(),
        reason,
    };

    if abbreviation.is_empty() {
        return Err(invalid("abbreviation is empty"));
    }
    if abbreviation.chars().any(|c| (c as u32) >= ALPHABET_SIZE as u32) {
        return Err(invalid("characters must be ASCII"));
    }
    if abbreviation.len() > ABBREVIATION_MAX_LEN {
        return Err(invalid("abbreviation is too long"));
    }
    Ok(())
}

pub fn validate_expansion(expansion: &str) -> Result<()> {
    if expansion.chars().count() > EXPANSION_MAX_LEN {
        return Err(AbbrvError::InvalidExpansion("expansion is too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviation_len_counts_characters() {
        assert_eq!(Entry::new("btw", "by the way").abbreviation_len(), 3);
        assert_eq!(Entry::new("", "").abbreviation_len(), 0);
    }

    #[test]
    fn validation_rules() {
        assert!(validate_abbreviation("btw").is_ok());
        assert!(validate_abbreviation("a b\t!").is_ok());
        assert!(validate_abbreviation("").is_err());
        assert!(validate_abbreviation("café").is_err());
        assert!(validate_abbreviation(&"x".repeat(ABBREVIATION_MAX_LEN)).is_ok());
        assert!(validate_abbreviation(&"x".repeat(ABBREVIATION_MAX_LEN + 1)).is_err());
        assert!(validate_expansion(&"y".repeat(EXPANSION_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn hidden_expansion_is_masked() {
        let entry = Entry::new("pw", "hunter2").hidden(true);
        assert_eq!(entry.display_expansion(), "*******");
        assert_eq!(Entry::new("pw", "hunter2").display_expansion(), "hunter2");
    }
}
