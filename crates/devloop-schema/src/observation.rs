//! Observation categories
//!
//! An observation is the typed result produced by executing an action. The
//! seven categories below classify what that result contains. Their order
//! and descriptions are part of the published reference and must not drift.

string_enum! {
    /// Kind of result an action produced
    pub enum ObservationType: "observation type" {
        /// The content of a file
        Read => "read",
        /// The HTML content of a URL
        Browse => "browse",
        /// The output of a command
        Run => "run",
        /// Runs a IPython cell.
        RunIpython => "run_ipython",
        /// The result of a search
        Recall => "recall",
        /// A message from the user
        Chat => "chat",
        /// The result of a task delegated to another agent
        Delegate => "delegate",
    }
}

impl ObservationType {
    /// Upper-case tag name used in the reference documentation
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Browse => "BROWSE",
            Self::Run => "RUN",
            Self::RunIpython => "RUN_IPYTHON",
            Self::Recall => "RECALL",
            Self::Chat => "CHAT",
            Self::Delegate => "DELEGATE",
        }
    }

    /// One-line documentation string for this category
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Read => "The content of a file",
            Self::Browse => "The HTML content of a URL",
            Self::Run => "The output of a command",
            Self::RunIpython => "Runs a IPython cell.",
            Self::Recall => "The result of a search",
            Self::Chat => "A message from the user",
            Self::Delegate => "The result of a task delegated to another agent",
        }
    }

    /// Render the markdown reference table for all categories
    #[must_use]
    pub fn reference_table() -> String {
        let mut out = String::from("| Tag | Value | Description |\n|---|---|---|\n");
        for kind in Self::ALL {
            out.push_str(&format!(
                "| {} | `{}` | {} |\n",
                kind.tag(),
                kind.as_str(),
                kind.description()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn enumeration_is_stable() {
        let tags: Vec<&str> = ObservationType::ALL.iter().map(ObservationType::tag).collect();
        assert_eq!(
            tags,
            vec!["READ", "BROWSE", "RUN", "RUN_IPYTHON", "RECALL", "CHAT", "DELEGATE"]
        );
    }

    #[test]
    fn reference_table_matches_documentation() {
        let expected = "\
| Tag | Value | Description |
|---|---|---|
| READ | `read` | The content of a file |
| BROWSE | `browse` | The HTML content of a URL |
| RUN | `run` | The output of a command |
| RUN_IPYTHON | `run_ipython` | Runs a IPython cell. |
| RECALL | `recall` | The result of a search |
| CHAT | `chat` | A message from the user |
| DELEGATE | `delegate` | The result of a task delegated to another agent |
";
        assert_eq!(ObservationType::reference_table(), expected);
    }

    #[test]
    fn tag_and_value_agree() {
        for kind in ObservationType::ALL {
            assert_eq!(kind.tag().to_lowercase(), kind.as_str());
        }
    }

    #[test]
    fn parse_rejects_upper_case_tag() {
        let err = "READ".parse::<ObservationType>().unwrap_err();
        assert!(err.to_string().contains("observation type"));
    }

    #[test]
    fn serde_uses_wire_value() {
        let json = serde_json::to_string(&ObservationType::RunIpython).unwrap();
        assert_eq!(json, "\"run_ipython\"");
        let back: ObservationType = serde_json::from_str("\"delegate\"").unwrap();
        assert_eq!(back, ObservationType::Delegate);
        assert!(serde_json::from_str::<ObservationType>("\"write\"").is_err());
    }
}
