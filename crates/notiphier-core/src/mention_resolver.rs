//! Inline @mention substitution for comment bodies.
//!
//! Platform mentions (`@username`) become Slack mention syntax (`<@U...>`)
//! when the directory knows the member. Text already in Slack mention form is
//! passed through untouched, so applying the resolver twice is a no-op.

use std::sync::OnceLock;

use regex::Regex;

use crate::user_directory::UserDirectory;

// Alternation order matters: an existing chat mention must win over the
// platform form so `<@U123>` is never re-substituted.
const MENTION_PATTERN: &str = r"<@[^>]+>|@([A-Za-z0-9._-]+)";

fn mention_regex() -> &'static Regex {
    static MENTION_REGEX: OnceLock<Regex> = OnceLock::new();
    MENTION_REGEX.get_or_init(|| Regex::new(MENTION_PATTERN).expect("mention pattern compiles"))
}

/// Substitutes resolvable platform mentions with Slack mention syntax.
/// Unresolved mentions are left exactly as typed.
pub async fn render_mentions(text: &str, directory: &UserDirectory) -> String {
    let regex = mention_regex();
    let mut rendered = String::with_capacity(text.len());
    let mut cursor = 0;
    for captures in regex.captures_iter(text) {
        let Some(matched) = captures.get(0) else {
            continue;
        };
        rendered.push_str(&text[cursor..matched.start()]);
        match captures.get(1) {
            Some(name) => match directory.resolve_chat_user(name.as_str()).await {
                Some(slack_id) => {
                    rendered.push_str("<@");
                    rendered.push_str(&slack_id);
                    rendered.push('>');
                }
                None => rendered.push_str(matched.as_str()),
            },
            // Already a chat-system mention.
            None => rendered.push_str(matched.as_str()),
        }
        cursor = matched.end();
    }
    rendered.push_str(&text[cursor..]);
    rendered
}

#[cfg(test)]
mod tests {
    use super::render_mentions;
    use crate::test_support::{fixture_directory, FixtureHub};
    use crate::user_directory::UserDirectory;

    async fn directory() -> UserDirectory {
        fixture_directory(&FixtureHub::new()).await
    }

    #[tokio::test]
    async fn functional_resolvable_mention_becomes_slack_syntax_exactly_once() {
        let directory = directory().await;
        let rendered = render_mentions("ping @brett about the deploy", &directory).await;
        assert_eq!(rendered, "ping <@U222> about the deploy");
        assert_eq!(rendered.matches("<@U222>").count(), 1);
    }

    #[tokio::test]
    async fn functional_unresolved_mention_is_left_as_typed() {
        let directory = directory().await;
        let rendered = render_mentions("cc @stranger and @brett", &directory).await;
        assert_eq!(rendered, "cc @stranger and <@U222>");
    }

    #[tokio::test]
    async fn regression_rendering_twice_does_not_double_substitute() {
        let directory = directory().await;
        let once = render_mentions("thanks @brett!", &directory).await;
        let twice = render_mentions(&once, &directory).await;
        assert_eq!(once, twice);
        assert_eq!(twice, "thanks <@U222>!");
    }

    #[tokio::test]
    async fn unit_text_without_mentions_passes_through() {
        let directory = directory().await;
        let rendered = render_mentions("no mentions here", &directory).await;
        assert_eq!(rendered, "no mentions here");
    }
}
