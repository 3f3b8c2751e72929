const DEFAULT_PREFIX: &str = "team_";

/// Maps team ids to the channel ids their messages are published on, and back.
#[derive(Debug, Clone)]
pub struct ChannelIdBuilder {
    prefixes: Vec<String>,
}

impl Default for ChannelIdBuilder {
    fn default() -> Self {
        ChannelIdBuilder::new(Vec::new())
    }
}

impl ChannelIdBuilder {
    /// An empty prefix list falls back to `team_`.
    pub fn new(prefixes: Vec<String>) -> Self {
        let prefixes = if prefixes.is_empty() {
            vec![DEFAULT_PREFIX.to_owned()]
        } else {
            prefixes
        };
        ChannelIdBuilder { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn build_channel_ids(&self, team_id: &str) -> Vec<String> {
        self.prefixes
            .iter()
            .map(|prefix| format!("{}{}", prefix, team_id))
            .collect()
    }

    /// Strip the first matching prefix. Channels that match none are their own team id.
    pub fn extract_team_id<'a>(&self, channel_id: &'a str) -> &'a str {
        self.prefixes
            .iter()
            .find_map(|prefix| channel_id.strip_prefix(prefix.as_str()))
            .unwrap_or(channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix() {
        let builder = ChannelIdBuilder::default();

        assert_eq!(builder.build_channel_ids("42"), vec!["team_42"]);
        assert_eq!(builder.extract_team_id("team_42"), "42");
        assert_eq!(builder.extract_team_id("lobby"), "lobby");
    }

    #[test]
    fn test_multiple_prefixes() {
        let builder = ChannelIdBuilder::new(vec!["team_".to_owned(), "guild_".to_owned()]);

        assert_eq!(builder.build_channel_ids("7"), vec!["team_7", "guild_7"]);
        assert_eq!(builder.extract_team_id("guild_7"), "7");
    }
}
