//! 下发通道契约
//!
//! 验证码的实际发送（邮件、短信）属于外部协作方，本库只定义核心
//! 面向它的契约。实现方对接具体供应商（SMTP、Twilio 等），
//! 由应用层注入。
//!
//! 引擎对下发失败的处理见
//! [`OtpEngine::issue_and_dispatch`](crate::otp::OtpEngine::issue_and_dispatch)：
//! 签发成功、下发失败，不回滚记录。

use async_trait::async_trait;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::otp::Purpose;

/// 验证码下发通道
///
/// 实现方根据 `destination` 的类型（邮箱/手机号）选择通道，
/// 根据 `purpose` 渲染相应的消息文案。
#[async_trait]
pub trait DeliveryDispatcher: Send + Sync {
    /// 把验证码发送到目标标识符
    async fn dispatch(&self, destination: &Identifier, purpose: &Purpose, code: &str)
        -> Result<()>;
}
