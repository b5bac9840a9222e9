use crate::error::{GatewayError, Result};
use crate::reply::ReplyBuilder;
use crate::xml::{self, Fields};

const REQUIRED_FIELDS: [&str; 4] = ["ToUserName", "FromUserName", "CreateTime", "MsgType"];

/// A decrypted inbound push. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    fields: Fields,
}

/// `ScanCodeInfo` group of a `scancode_push` / `scancode_waitmsg` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCodeInfo {
    pub scan_type: String,
    pub scan_result: String,
}

/// `BatchJob` group of a `batch_job_result` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub job_id: String,
    pub job_type: String,
    pub err_code: String,
    pub err_msg: String,
}

impl Message {
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_fields(xml::read_document(xml)?)
    }

    pub fn from_fields(fields: Fields) -> Result<Self> {
        if let Some(missing) = REQUIRED_FIELDS
            .iter()
            .find(|name| !fields.contains_key(**name))
        {
            return Err(GatewayError::MalformedXml(format!(
                "message is missing <{missing}>"
            )));
        }
        Ok(Self { fields })
    }

    /// Field by dotted path, e.g. `ScanCodeInfo.ScanResult`.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.fields.get(path).map(String::as_str)
    }

    fn required(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn to_user_name(&self) -> &str {
        self.required("ToUserName")
    }

    pub fn from_user_name(&self) -> &str {
        self.required("FromUserName")
    }

    pub fn create_time(&self) -> &str {
        self.required("CreateTime")
    }

    pub fn msg_type(&self) -> &str {
        self.required("MsgType")
    }

    pub fn msg_id(&self) -> Option<&str> {
        self.get("MsgId")
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.get("AgentID")
    }

    pub fn content(&self) -> Option<&str> {
        self.get("Content")
    }

    pub fn event(&self) -> Option<&str> {
        self.get("Event")
    }

    pub fn event_key(&self) -> Option<&str> {
        self.get("EventKey")
    }

    /// Present when either member of the group is; a missing member reads as empty.
    pub fn scan_code_info(&self) -> Option<ScanCodeInfo> {
        let scan_type = self.get("ScanCodeInfo.ScanType");
        let scan_result = self.get("ScanCodeInfo.ScanResult");
        if scan_type.is_none() && scan_result.is_none() {
            return None;
        }
        Some(ScanCodeInfo {
            scan_type: scan_type.unwrap_or_default().to_string(),
            scan_result: scan_result.unwrap_or_default().to_string(),
        })
    }

    pub fn batch_job(&self) -> Option<BatchJob> {
        let field = |name: &str| {
            self.get(&format!("BatchJob.{name}"))
                .unwrap_or_default()
                .to_string()
        };
        self.get("BatchJob.JobType")?;
        Some(BatchJob {
            job_id: field("JobId"),
            job_type: field("JobType"),
            err_code: field("ErrCode"),
            err_msg: field("ErrMsg"),
        })
    }

    /// Start a reply addressed back to the sender of this message.
    pub fn reply(&self) -> ReplyBuilder<'_> {
        ReplyBuilder::new(self)
    }
}
