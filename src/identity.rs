//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了身份提供者接口。认证协议本身由外部身份服务完成，
//! 这里只保存认证结果，用于解析缓存命名空间的主体。

use secrecy::SecretString;
use std::sync::RwLock;
use tracing::info;

use crate::utils::redaction::redact_principal;

/// 身份提供者
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// 当前已认证的主体，未登录时为 `None`
    fn current_principal(&self) -> Option<String>;

    /// 记录外部认证成功后的主体与访问令牌
    fn login(&self, principal: &str, token: SecretString);

    /// 退出登录
    fn logout(&self);
}

#[derive(Default)]
struct Session {
    principal: Option<String>,
    token: Option<SecretString>,
}

/// 进程内会话身份
#[derive(Default)]
pub struct SessionIdentity {
    session: RwLock<Session>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前会话的访问令牌，供远程调用层附加到请求上
    pub fn bearer_token(&self) -> Option<SecretString> {
        let session = self.session.read().unwrap_or_else(|e| e.into_inner());
        session.token.clone()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_principal(&self) -> Option<String> {
        let session = self.session.read().unwrap_or_else(|e| e.into_inner());
        session.principal.clone()
    }

    fn login(&self, principal: &str, token: SecretString) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        session.principal = Some(principal.to_string());
        session.token = Some(token);
        info!("principal {} logged in", redact_principal(principal));
    }

    fn logout(&self) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        if let Some(principal) = session.principal.take() {
            info!("principal {} logged out", redact_principal(&principal));
        }
        session.token = None;
    }
}
