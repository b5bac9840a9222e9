use crate::error::Result;
use crate::message::Message;
use crate::xml::DocumentWriter;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub pic_url: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Text {
        content: String,
    },
    News {
        articles: Vec<Article>,
    },
    Image {
        media_id: String,
    },
    Voice {
        media_id: String,
    },
    Video {
        media_id: String,
        title: String,
        description: String,
    },
}

/// Passive reply to an inbound message, addressed back to its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub to_user_name: String,
    pub from_user_name: String,
    pub create_time: i64,
    pub body: ReplyBody,
}

impl Reply {
    pub fn msg_type(&self) -> &'static str {
        match self.body {
            ReplyBody::Text { .. } => "text",
            ReplyBody::News { .. } => "news",
            ReplyBody::Image { .. } => "image",
            ReplyBody::Voice { .. } => "voice",
            ReplyBody::Video { .. } => "video",
        }
    }

    /// Override the creation timestamp (unix seconds).
    pub fn at(mut self, create_time: i64) -> Self {
        self.create_time = create_time;
        self
    }

    /// Inner XML document carried inside the encrypted envelope.
    pub fn to_xml(&self) -> Result<String> {
        let mut doc = DocumentWriter::new()?;
        doc.cdata("ToUserName", &self.to_user_name)?;
        doc.cdata("FromUserName", &self.from_user_name)?;
        doc.text("CreateTime", &self.create_time.to_string())?;
        doc.cdata("MsgType", self.msg_type())?;

        match &self.body {
            ReplyBody::Text { content } => doc.cdata("Content", content)?,
            ReplyBody::News { articles } => {
                doc.text("ArticleCount", &articles.len().to_string())?;
                doc.open("Articles")?;
                for article in articles {
                    doc.open("item")?;
                    doc.cdata("Title", &article.title)?;
                    doc.cdata("Description", &article.description)?;
                    doc.cdata("PicUrl", &article.pic_url)?;
                    doc.cdata("Url", &article.url)?;
                    doc.close("item")?;
                }
                doc.close("Articles")?;
            }
            ReplyBody::Image { media_id } => media_group(&mut doc, "Image", media_id)?,
            ReplyBody::Voice { media_id } => media_group(&mut doc, "Voice", media_id)?,
            ReplyBody::Video {
                media_id,
                title,
                description,
            } => {
                doc.open("Video")?;
                doc.cdata("MediaId", media_id)?;
                doc.cdata("Title", title)?;
                doc.cdata("Description", description)?;
                doc.close("Video")?;
            }
        }
        doc.finish()
    }
}

fn media_group(doc: &mut DocumentWriter, group: &str, media_id: &str) -> Result<()> {
    doc.open(group)?;
    doc.cdata("MediaId", media_id)?;
    doc.close(group)
}

/// Builds a [`Reply`] with sender and recipient swapped from the originating message.
pub struct ReplyBuilder<'a> {
    message: &'a Message,
}

impl<'a> ReplyBuilder<'a> {
    pub(crate) fn new(message: &'a Message) -> Self {
        Self { message }
    }

    pub fn body(self, body: ReplyBody) -> Reply {
        Reply {
            to_user_name: self.message.from_user_name().to_string(),
            from_user_name: self.message.to_user_name().to_string(),
            create_time: chrono::Utc::now().timestamp(),
            body,
        }
    }

    pub fn text(self, content: impl Into<String>) -> Reply {
        self.body(ReplyBody::Text {
            content: content.into(),
        })
    }

    pub fn news(self, articles: Vec<Article>) -> Reply {
        self.body(ReplyBody::News { articles })
    }

    pub fn image(self, media_id: impl Into<String>) -> Reply {
        self.body(ReplyBody::Image {
            media_id: media_id.into(),
        })
    }

    pub fn voice(self, media_id: impl Into<String>) -> Reply {
        self.body(ReplyBody::Voice {
            media_id: media_id.into(),
        })
    }

    pub fn video(
        self,
        media_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Reply {
        self.body(ReplyBody::Video {
            media_id: media_id.into(),
            title: title.into(),
            description: description.into(),
        })
    }
}
