//! Server rendered pages.
//!
//! Every view is a maud function returning `Markup`. maud escapes all
//! interpolated values; the only place `PreEscaped` is used is message
//! content, which has already been through [`crate::content::render`].

use crate::model::{Topic, TopicSummary, User, THEME_COUNT};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use time::OffsetDateTime;

const THEME_NAMES: [&str; THEME_COUNT as usize] =
    ["Tomato", "Tangerine", "Lime", "Teal", "Blueberry", "Grape"];

fn timestamp(unix: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(unix) {
        Ok(t) => format!(
            "{}-{:02}-{:02} {:02}:{:02} UTC",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute()
        ),
        Err(_) => String::new(),
    }
}

fn avatar(initials: &str, theme: u8) -> Markup {
    html! {
        span class={ "avatar theme-" (theme) } { (initials) }
    }
}

fn page(title: &str, user: Option<&User>, flashes: &[String], body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | Topical" }
                link rel="stylesheet" href="/static/style.css";
            }
            body {
                header class="site-header" {
                    a class="brand" href="/topics" { "Topical" }
                    nav {
                        @if let Some(user) = user {
                            a class="button" href="/topics/new" { "New topic" }
                            (avatar(user.initials(), user.theme()))
                        } @else {
                            a class="button" href="/join" { "Join" }
                        }
                    }
                }
                @for flash in flashes {
                    section class="flash flash-error" { (flash) }
                }
                main { (body) }
            }
        }
    }
}

/// List of recently active topics.
pub fn topic_list(topics: &[TopicSummary], user: Option<&User>, flashes: &[String]) -> Markup {
    let body = html! {
        h1 { "Recent topics" }
        @if topics.is_empty() {
            p class="empty" { "Nothing here yet. Start the first topic!" }
        } @else {
            ul class="topic-list" {
                @for topic in topics {
                    li class="topic-row" {
                        (avatar(&topic.author_initials, topic.author_theme))
                        a class="topic-title" href={ "/topics/" (topic.id) } { (topic.title) }
                        span class="topic-meta" {
                            (topic.message_count)
                            @if topic.message_count == 1 { " message" } @else { " messages" }
                            " · last post " (timestamp(topic.last_posted))
                        }
                    }
                }
            }
        }
    };
    page("Topics", user, flashes, body)
}

/// A topic with its thread and, for joined visitors, a reply form.
pub fn topic_show(topic: &Topic, user: Option<&User>, flashes: &[String]) -> Markup {
    let body = html! {
        article class="topic" {
            h2 { (topic.title) }
            @for message in &topic.messages {
                div class="message" {
                    (avatar(&message.author_initials, message.author_theme))
                    div class="message-body" {
                        time class="message-posted" { (timestamp(message.posted)) }
                        div class="message-content" { (PreEscaped(&message.content)) }
                    }
                }
            }
        }
        @if user.is_some() {
            form class="new-message-form" method="post" action={ "/topics/" (topic.id) "/messages" } {
                label for="content" { "Reply" }
                textarea id="content" name="content" rows="4" required {}
                button type="submit" { "Post reply" }
            }
        } @else {
            p class="join-prompt" { a href="/join" { "Join" } " to reply." }
        }
    };
    page(&topic.title, user, flashes, body)
}

/// Form for starting a new topic.
pub fn topic_new(user: &User, flashes: &[String]) -> Markup {
    let body = html! {
        h1 { "Start a topic" }
        form class="new-message-form new-topic-form" method="post" action="/topics" {
            label for="title" { "Title" }
            input id="title" name="title" type="text" required;
            label for="content" { "Message" }
            textarea id="content" name="content" rows="6" required {}
            button type="submit" { "Post topic" }
        }
    };
    page("New topic", Some(user), flashes, body)
}

/// Identity picker.
pub fn join(flashes: &[String]) -> Markup {
    let body = html! {
        h1 { "Join the conversation." }
        form class="join-form" method="post" action="/join" {
            label for="initials" { "Your initials" }
            input id="initials" name="initials" type="text" maxlength="2" pattern="[A-Z]{2}"
                placeholder="AK" required;
            fieldset class="themes" {
                legend { "Pick a color" }
                @for (i, name) in THEME_NAMES.iter().enumerate() {
                    label class={ "theme-choice theme-" (i) } {
                        input type="radio" name="theme" value=(i) checked[i == 0];
                        (name)
                    }
                }
            }
            button type="submit" { "Join" }
        }
    };
    page("Join", None, flashes, body)
}

/// Generic failure page; carries no detail about the cause.
pub fn error_page(title: &str, message: &str) -> Markup {
    let body = html! {
        div class="error-page" {
            h1 { (title) }
            p { (message) }
            a href="/topics" { "Back to topics" }
        }
    };
    page(title, None, &[], body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;

    fn user() -> User {
        User::new("AK", 3).unwrap()
    }

    #[test]
    fn flashes_are_rendered() {
        let html = topic_list(&[], None, &["Important flash".into()]).into_string();
        assert!(html.contains(r#"<section class="flash flash-error">Important flash</section>"#));
    }

    #[test]
    fn list_shows_titles_escaped() {
        let topics = vec![
            TopicSummary {
                id: 1,
                title: "First list title".into(),
                message_count: 1,
                author_initials: "AK".into(),
                author_theme: 3,
                last_posted: 0,
            },
            TopicSummary {
                id: 2,
                title: "<b>Second</b>".into(),
                message_count: 2,
                author_initials: "JK".into(),
                author_theme: 1,
                last_posted: 60,
            },
        ];
        let html = topic_list(&topics, Some(&user()), &[]).into_string();
        assert!(html.contains("First list title"));
        assert!(html.contains("&lt;b&gt;Second&lt;/b&gt;"));
        assert!(html.contains(r#"href="/topics/2""#));
        assert!(html.contains("1 message ·"));
        assert!(html.contains("2 messages ·"));
        assert!(html.contains("1970-01-01 00:01 UTC"));
    }

    #[test]
    fn show_trusts_only_sanitized_content() {
        let topic = Topic {
            id: 12,
            title: "<i>First Title</i>".into(),
            messages: vec![Message {
                id: 1,
                topic_id: 12,
                content: "<p><strong>hi</strong></p>".into(),
                author_initials: "AK".into(),
                author_theme: 3,
                posted: 0,
            }],
        };
        let html = topic_show(&topic, Some(&user()), &[]).into_string();
        assert!(html.contains("<h2>&lt;i&gt;First Title&lt;/i&gt;</h2>"));
        assert!(html.contains("<p><strong>hi</strong></p>"));
        assert!(html.contains(r#"action="/topics/12/messages""#));
    }

    #[test]
    fn show_hides_reply_form_for_anonymous() {
        let topic = Topic {
            id: 3,
            title: "t".into(),
            messages: vec![],
        };
        let html = topic_show(&topic, None, &[]).into_string();
        assert!(!html.contains("new-message-form"));
        assert!(html.contains(r#"href="/join""#));
    }

    #[test]
    fn new_topic_form() {
        let html = topic_new(&user(), &[]).into_string();
        assert!(html.contains(r#"<form class="new-message-form"#));
        assert!(html.contains(r#"name="title""#));
        assert!(html.contains(r#"class="avatar theme-3">AK<"#));
    }

    #[test]
    fn join_page_lists_palette() {
        let html = join(&[]).into_string();
        assert!(html.contains("Join the conversation."));
        for i in 0..THEME_COUNT {
            assert!(html.contains(&format!(r#"value="{i}""#)));
        }
    }
}
