//! Business rules the gateway ships with: echo, news, welcome, menu clicks,
//! QR / barcode bindings and batch job notifications.

use crate::message::Message;
use crate::reply::{Article, Reply};
use crate::router::{Category, Params, Router};

pub const BARCODE_PREFIX: &str = "CODE_39,";

pub fn sample_router() -> Router {
    Router::builder()
        .on(Category::Text, echo_text)
        .on_with(Category::Text, "mpnews", mpnews)
        .on_with(Category::Event, "subscribe", |m: &Message, _: &Params| {
            Some(m.reply().text("welcome!"))
        })
        .on_with(Category::Event, "enter_agent", |m: &Message, _: &Params| {
            Some(m.reply().text("echo: enter_agent"))
        })
        .on_with(Category::Click, "BOOK_LUNCH", book_lunch)
        .on_with(Category::Scan, "BINDING_QR_CODE", binding_qr_code)
        .on_with(Category::Scan, "BINDING_BARCODE", binding_barcode)
        .on_with(Category::BatchJob, "replace_user", replace_user)
        .build()
}

fn echo_text(message: &Message, params: &Params) -> Option<Reply> {
    let Params::Text { content } = params else {
        return None;
    };
    Some(message.reply().text(format!("echo: {content}")))
}

fn mpnews(message: &Message, _: &Params) -> Option<Reply> {
    let article = Article {
        title: "title".into(),
        description: "desc".into(),
        pic_url: "http://www.baidu.com/img/bdlogo.gif".into(),
        url: "http://www.baidu.com/".into(),
    };
    Some(message.reply().news(vec![article]))
}

fn book_lunch(message: &Message, params: &Params) -> Option<Reply> {
    let Params::EventKey { key } = params else {
        return None;
    };
    Some(
        message
            .reply()
            .text(format!("{} click {key}", message.from_user_name())),
    )
}

fn binding_qr_code(message: &Message, params: &Params) -> Option<Reply> {
    let Params::ScanPush {
        scan_result,
        scan_type,
    } = params
    else {
        return None;
    };
    Some(message.reply().text(format!(
        "User {} ScanResult {scan_result} ScanType {scan_type}",
        message.from_user_name()
    )))
}

/// Barcode scans arrive as `<symbology>,<value>`; only Code 39 is bound.
fn binding_barcode(message: &Message, params: &Params) -> Option<Reply> {
    let scan_result = match params {
        Params::ScanWaitMsg { scan_result } | Params::ScanPush { scan_result, .. } => scan_result,
        _ => return None,
    };
    let value = scan_result.strip_prefix(BARCODE_PREFIX)?.split(',').next()?;
    Some(message.reply().text(format!(
        "User: {} scan barcode, result is {value}",
        message.from_user_name()
    )))
}

fn replace_user(message: &Message, params: &Params) -> Option<Reply> {
    let Params::BatchJob(job) = params else {
        return None;
    };
    Some(message.reply().text(format!(
        "Replace user job {} finished, return code {}, return message {}",
        job.job_id, job.err_code, job.err_msg
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ReplyBody;

    fn message(from: &str, extra: &str) -> Message {
        Message::from_xml(&format!(
            "<xml><ToUserName>toUser</ToUserName><FromUserName>{from}</FromUserName>\
             <CreateTime>1348831860</CreateTime><MsgId>1234567890123456</MsgId>{extra}</xml>"
        ))
        .unwrap()
    }

    fn text_of(reply: Option<Reply>) -> Option<String> {
        match reply?.body {
            ReplyBody::Text { content } => Some(content),
            _ => None,
        }
    }

    fn barcode(scan_result: &str) -> Message {
        message(
            "userid",
            &format!(
                "<MsgType>event</MsgType><Event>scancode_waitmsg</Event>\
                 <EventKey>BINDING_BARCODE</EventKey>\
                 <ScanCodeInfo><ScanType>barcode</ScanType><ScanResult>{scan_result}</ScanResult></ScanCodeInfo>"
            ),
        )
    }

    #[test]
    fn test_barcode_with_code39_prefix_replies() {
        let router = sample_router();
        assert_eq!(
            text_of(router.dispatch(&barcode("CODE_39,SAP0D00"))).as_deref(),
            Some("User: userid scan barcode, result is SAP0D00")
        );
    }

    #[test]
    fn test_barcode_without_prefix_is_silent() {
        let router = sample_router();
        assert!(router.dispatch(&barcode("EAN_13,4006381333931")).is_none());
        assert!(router.dispatch(&barcode("SAP0D00")).is_none());
    }

    #[test]
    fn test_mpnews_takes_precedence_over_echo() {
        let router = sample_router();
        let reply = router
            .dispatch(&message(
                "fromUser",
                "<MsgType>text</MsgType><Content>mpnews</Content>",
            ))
            .unwrap();
        assert_eq!(reply.msg_type(), "news");
        let ReplyBody::News { articles } = reply.body else {
            panic!("expected news reply");
        };
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "title");
    }

    #[test]
    fn test_unknown_click_key_is_silent() {
        let router = sample_router();
        let click = message(
            "fromUser",
            "<MsgType>event</MsgType><Event>click</Event><EventKey>UNKNOWN</EventKey>",
        );
        assert!(router.dispatch(&click).is_none());
    }
}
