//! Ordered rule table mapping a message's category and subtype key to a handler.
//!
//! Within a category the first rule whose matcher accepts the key wins; when
//! none does, the first matcher-less rule of that category fires instead.
//! A rule that fires ends dispatch even if its handler produces no reply.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;
use wxgate_core::message::Message;
use wxgate_core::reply::Reply;

use crate::params::{Handler, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Text,
    Image,
    Voice,
    Video,
    ShortVideo,
    Location,
    Link,
    /// Plain events (`subscribe`, `enter_agent`, ...) keyed by event name.
    Event,
    Click,
    View,
    /// `scancode_push` and `scancode_waitmsg`, keyed by `EventKey`.
    Scan,
    /// `batch_job_result`, keyed by `BatchJob.JobType`.
    BatchJob,
    /// Fires only when no rule of any other category did.
    Fallback,
}

impl Category {
    fn for_media_type(msg_type: &str) -> Option<Self> {
        match msg_type {
            "image" => Some(Category::Image),
            "voice" => Some(Category::Voice),
            "video" => Some(Category::Video),
            "shortvideo" => Some(Category::ShortVideo),
            "location" => Some(Category::Location),
            "link" => Some(Category::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Matcher::Pattern)
    }

    fn accepts(&self, key: &str, ignore_case: bool) -> bool {
        match self {
            Matcher::Exact(expected) if ignore_case => expected.eq_ignore_ascii_case(key),
            Matcher::Exact(expected) => expected == key,
            Matcher::Pattern(regex) => regex.is_match(key),
        }
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Matcher::Exact(value.to_string())
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Matcher::Exact(value)
    }
}

struct Rule {
    category: Category,
    matcher: Option<Matcher>,
    handler: Arc<dyn Handler>,
}

#[derive(Default)]
pub struct RouterBuilder {
    rules: Vec<Rule>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catch-all rule for `category`.
    pub fn on<F>(self, category: Category, handler: F) -> Self
    where
        F: Fn(&Message, &Params) -> Option<Reply> + Send + Sync + 'static,
    {
        self.rule(category, None, Arc::new(handler))
    }

    /// Rule that fires only when the category's subtype key satisfies `matcher`.
    pub fn on_with<F>(self, category: Category, matcher: impl Into<Matcher>, handler: F) -> Self
    where
        F: Fn(&Message, &Params) -> Option<Reply> + Send + Sync + 'static,
    {
        self.rule(category, Some(matcher.into()), Arc::new(handler))
    }

    pub fn rule(
        mut self,
        category: Category,
        matcher: Option<Matcher>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.rules.push(Rule {
            category,
            matcher,
            handler,
        });
        self
    }

    pub fn build(self) -> Router {
        Router { rules: self.rules }
    }
}

/// Immutable route table, shared across requests.
pub struct Router {
    rules: Vec<Rule>,
}

enum Routed {
    Fired(Option<Reply>),
    Unmatched,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the first matching rule. Unroutable messages yield `None`.
    pub fn dispatch(&self, message: &Message) -> Option<Reply> {
        let msg_type = message.msg_type().to_ascii_lowercase();
        let routed = match msg_type.as_str() {
            "text" => {
                let content = message.content().unwrap_or_default();
                let params = Params::Text {
                    content: content.to_string(),
                };
                self.fire(Category::Text, Some(content), message, params)
            }
            "event" => self.dispatch_event(message),
            other => match Category::for_media_type(other) {
                Some(category) => self.fire(category, None, message, Params::Plain),
                None => Routed::Unmatched,
            },
        };

        match routed {
            Routed::Fired(reply) => reply,
            Routed::Unmatched => match self.fire(Category::Fallback, None, message, Params::Plain) {
                Routed::Fired(reply) => reply,
                Routed::Unmatched => {
                    debug!(msg_type = %msg_type, "no route for message");
                    None
                }
            },
        }
    }

    fn dispatch_event(&self, message: &Message) -> Routed {
        let event = message.event().unwrap_or_default().to_ascii_lowercase();
        let event_key = message.event_key().unwrap_or_default();

        match event.as_str() {
            "click" => {
                let params = Params::EventKey {
                    key: event_key.to_string(),
                };
                match self.fire(Category::Click, Some(event_key), message, params.clone()) {
                    // Menu keys may also be registered as plain events.
                    Routed::Unmatched => self.fire(Category::Event, Some(event_key), message, params),
                    fired => fired,
                }
            }
            "view" => {
                let params = Params::EventKey {
                    key: event_key.to_string(),
                };
                self.fire(Category::View, Some(event_key), message, params)
            }
            "scancode_push" | "scancode_waitmsg" => {
                let info = message.scan_code_info();
                let scan_result = info
                    .as_ref()
                    .map(|i| i.scan_result.clone())
                    .unwrap_or_default();
                let params = if event == "scancode_push" {
                    Params::ScanPush {
                        scan_result,
                        scan_type: info.map(|i| i.scan_type).unwrap_or_default(),
                    }
                } else {
                    Params::ScanWaitMsg { scan_result }
                };
                self.fire(Category::Scan, Some(event_key), message, params)
            }
            "batch_job_result" => match message.batch_job() {
                Some(job) => {
                    let job_type = job.job_type.clone();
                    self.fire(Category::BatchJob, Some(job_type.as_str()), message, Params::BatchJob(job))
                }
                None => Routed::Unmatched,
            },
            _ => self.fire(Category::Event, Some(event.as_str()), message, Params::Plain),
        }
    }

    fn fire(
        &self,
        category: Category,
        key: Option<&str>,
        message: &Message,
        params: Params,
    ) -> Routed {
        let Some(rule) = self.select(category, key) else {
            return Routed::Unmatched;
        };
        debug!(
            category = ?category,
            matcher = ?rule.matcher,
            key = key.unwrap_or_default(),
            "route matched"
        );
        Routed::Fired(rule.handler.handle(message, &params))
    }

    fn select(&self, category: Category, key: Option<&str>) -> Option<&Rule> {
        let ignore_case = category == Category::Event;
        let in_category = || self.rules.iter().filter(move |r| r.category == category);

        if let Some(key) = key {
            let specific = in_category().find(|r| {
                r.matcher
                    .as_ref()
                    .is_some_and(|m| m.accepts(key, ignore_case))
            });
            if specific.is_some() {
                return specific;
            }
        }
        in_category().find(|r| r.matcher.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(extra: &str) -> Message {
        Message::from_xml(&format!(
            "<xml><ToUserName>toUser</ToUserName><FromUserName>fromUser</FromUserName>\
             <CreateTime>1348831860</CreateTime><MsgId>1234567890123456</MsgId>{extra}</xml>"
        ))
        .unwrap()
    }

    fn text_reply(
        content: &'static str,
    ) -> impl Fn(&Message, &Params) -> Option<Reply> + Send + Sync + 'static {
        move |m: &Message, _: &Params| Some(m.reply().text(content))
    }

    fn content(reply: Option<Reply>) -> Option<String> {
        match reply?.body {
            wxgate_core::reply::ReplyBody::Text { content } => Some(content),
            _ => None,
        }
    }

    #[test]
    fn test_specific_matcher_beats_earlier_catch_all() {
        let router = Router::builder()
            .on(Category::Text, |m: &Message, p: &Params| match p {
                Params::Text { content } => Some(m.reply().text(format!("echo: {content}"))),
                _ => None,
            })
            .on_with(Category::Text, "mpnews", text_reply("news"))
            .build();

        let hello = message("<MsgType>text</MsgType><Content>hello</Content>");
        assert_eq!(content(router.dispatch(&hello)).as_deref(), Some("echo: hello"));

        let mpnews = message("<MsgType>text</MsgType><Content>mpnews</Content>");
        assert_eq!(content(router.dispatch(&mpnews)).as_deref(), Some("news"));
    }

    #[test]
    fn test_first_registered_matcher_wins() {
        let router = Router::builder()
            .on_with(Category::Text, Matcher::pattern("^he").unwrap(), text_reply("first"))
            .on_with(Category::Text, "hello", text_reply("second"))
            .build();
        let hello = message("<MsgType>text</MsgType><Content>hello</Content>");
        assert_eq!(content(router.dispatch(&hello)).as_deref(), Some("first"));
    }

    #[test]
    fn test_fired_rule_without_reply_does_not_fall_through() {
        let router = Router::builder()
            .on_with(Category::Text, "quiet", |_: &Message, _: &Params| None)
            .on(Category::Text, text_reply("catch-all"))
            .on(Category::Fallback, text_reply("fallback"))
            .build();
        let quiet = message("<MsgType>text</MsgType><Content>quiet</Content>");
        assert!(router.dispatch(&quiet).is_none());
    }

    #[test]
    fn test_unmatched_message_yields_no_reply() {
        let router = Router::builder()
            .on_with(Category::Event, "subscribe", text_reply("welcome!"))
            .build();
        let voice = message("<MsgType>voice</MsgType><MediaId>m</MediaId>");
        assert!(router.dispatch(&voice).is_none());

        let unsubscribe = message("<MsgType>event</MsgType><Event>unsubscribe</Event>");
        assert!(router.dispatch(&unsubscribe).is_none());
    }

    #[test]
    fn test_fallback_fires_only_when_nothing_else_does() {
        let router = Router::builder()
            .on(Category::Image, text_reply("image"))
            .on(Category::Fallback, text_reply("fallback"))
            .build();
        let image = message("<MsgType>image</MsgType><PicUrl>u</PicUrl>");
        assert_eq!(content(router.dispatch(&image)).as_deref(), Some("image"));
        let voice = message("<MsgType>voice</MsgType>");
        assert_eq!(content(router.dispatch(&voice)).as_deref(), Some("fallback"));
    }

    #[test]
    fn test_event_name_is_case_insensitive() {
        let router = Router::builder()
            .on_with(Category::Event, "subscribe", text_reply("welcome!"))
            .build();
        let subscribe = message("<MsgType>event</MsgType><Event>SUBSCRIBE</Event>");
        assert_eq!(content(router.dispatch(&subscribe)).as_deref(), Some("welcome!"));
    }

    #[test]
    fn test_click_passes_event_key_and_falls_back_to_event_rules() {
        let router = Router::builder()
            .on_with(Category::Click, "BOOK_LUNCH", |m: &Message, p: &Params| match p {
                Params::EventKey { key } => {
                    Some(m.reply().text(format!("{} click {key}", m.from_user_name())))
                }
                _ => None,
            })
            .on_with(Category::Event, "enter_agent", text_reply("echo: enter_agent"))
            .build();

        let lunch = message("<MsgType>event</MsgType><Event>click</Event><EventKey>BOOK_LUNCH</EventKey>");
        assert_eq!(
            content(router.dispatch(&lunch)).as_deref(),
            Some("fromUser click BOOK_LUNCH")
        );

        let enter = message("<MsgType>event</MsgType><Event>click</Event><EventKey>enter_agent</EventKey>");
        assert_eq!(
            content(router.dispatch(&enter)).as_deref(),
            Some("echo: enter_agent")
        );
    }

    #[test]
    fn test_scan_params_differ_by_event() {
        let router = Router::builder()
            .on(Category::Scan, |m: &Message, p: &Params| {
                let text = match p {
                    Params::ScanPush {
                        scan_result,
                        scan_type,
                    } => format!("push {scan_result} {scan_type}"),
                    Params::ScanWaitMsg { scan_result } => format!("wait {scan_result}"),
                    _ => return None,
                };
                Some(m.reply().text(text))
            })
            .build();
        let info = "<ScanCodeInfo><ScanType>qrcode</ScanType><ScanResult>r</ScanResult></ScanCodeInfo>";

        let push = message(&format!(
            "<MsgType>event</MsgType><Event>scancode_push</Event><EventKey>K</EventKey>{info}"
        ));
        assert_eq!(content(router.dispatch(&push)).as_deref(), Some("push r qrcode"));

        let wait = message(&format!(
            "<MsgType>event</MsgType><Event>scancode_waitmsg</Event><EventKey>K</EventKey>{info}"
        ));
        assert_eq!(content(router.dispatch(&wait)).as_deref(), Some("wait r"));
    }

    #[test]
    fn test_batch_job_matched_on_job_type() {
        let router = Router::builder()
            .on_with(Category::BatchJob, "sync_user", text_reply("sync"))
            .on_with(Category::BatchJob, "replace_user", |m: &Message, p: &Params| match p {
                Params::BatchJob(job) => Some(m.reply().text(format!(
                    "{} {} {}",
                    job.job_id, job.err_code, job.err_msg
                ))),
                _ => None,
            })
            .build();
        let done = message(
            "<MsgType>event</MsgType><Event>batch_job_result</Event>\
             <BatchJob><JobId>job_id</JobId><JobType>replace_user</JobType>\
             <ErrCode>0</ErrCode><ErrMsg>ok</ErrMsg></BatchJob>",
        );
        assert_eq!(content(router.dispatch(&done)).as_deref(), Some("job_id 0 ok"));
    }

    #[test]
    fn test_router_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Router>();

        let router = Arc::new(Router::builder().on(Category::Text, text_reply("ok")).build());
        assert_eq!(router.len(), 1);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let router = router.clone();
                std::thread::spawn(move || {
                    let hi = message("<MsgType>text</MsgType><Content>hi</Content>");
                    content(router.dispatch(&hi))
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("ok"));
        }
    }
}
