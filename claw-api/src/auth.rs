//! Bot Request Authentication
//!
//! Every bot request carries four headers:
//!
//! ```text
//! x-bot-id:        strategy-bot-1
//! x-bot-timestamp: 1700000000
//! x-bot-nonce:     6f1c...
//! x-bot-signature: 0x... (EIP-191 over openfunderse:auth:{botId}:{timestamp}:{nonce})
//! ```
//!
//! A request moves UNVERIFIED -> SIGNATURE_CHECKED -> SCOPE_CHECKED ->
//! AUTHORIZED and stops at the first stage that fails.
//!
//! Registered bots must sign with their on-file address. Unregistered bots
//! only get through when the endpoint requires no scope at all (fund
//! bootstrap). Each `(botId, nonce)` pair is accepted once.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use claw_core::replay::{assert_timestamp_within_window, BOT_REQUEST_WINDOW_SECS};
use claw_core::Address;
use claw_signer::recover_bot_signer;
use claw_store::{BotNonceRepository, BotRepository, BotRole, MembershipRepository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};

pub const HEADER_BOT_ID: &str = "x-bot-id";
pub const HEADER_BOT_SIGNATURE: &str = "x-bot-signature";
pub const HEADER_BOT_TIMESTAMP: &str = "x-bot-timestamp";
pub const HEADER_BOT_NONCE: &str = "x-bot-nonce";

/// Permission a bot endpoint can require
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BotScope {
    #[serde(rename = "intents.propose")]
    IntentsPropose,
    #[serde(rename = "bots.register")]
    BotsRegister,
    #[serde(rename = "funds.bootstrap")]
    FundsBootstrap,
    #[serde(rename = "claims.submit")]
    ClaimsSubmit,
    #[serde(rename = "claims.attest")]
    ClaimsAttest,
    #[serde(rename = "intents.attest")]
    IntentsAttest,
}

impl BotScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotScope::IntentsPropose => "intents.propose",
            BotScope::BotsRegister => "bots.register",
            BotScope::FundsBootstrap => "funds.bootstrap",
            BotScope::ClaimsSubmit => "claims.submit",
            BotScope::ClaimsAttest => "claims.attest",
            BotScope::IntentsAttest => "intents.attest",
        }
    }

    /// Scopes granted by one role
    pub fn granted_by(role: BotRole) -> &'static [BotScope] {
        match role {
            BotRole::Strategy => &[
                BotScope::IntentsPropose,
                BotScope::BotsRegister,
                BotScope::FundsBootstrap,
            ],
            BotRole::Participant => &[
                BotScope::ClaimsSubmit,
                BotScope::ClaimsAttest,
                BotScope::IntentsAttest,
            ],
        }
    }

    /// Union of the scopes of every role
    pub fn for_roles<'a, I>(roles: I) -> BTreeSet<BotScope>
    where
        I: IntoIterator<Item = &'a BotRole>,
    {
        roles
            .into_iter()
            .flat_map(|role| Self::granted_by(*role).iter().copied())
            .collect()
    }
}

impl std::fmt::Display for BotScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "intents.propose" => Ok(BotScope::IntentsPropose),
            "bots.register" => Ok(BotScope::BotsRegister),
            "funds.bootstrap" => Ok(BotScope::FundsBootstrap),
            "claims.submit" => Ok(BotScope::ClaimsSubmit),
            "claims.attest" => Ok(BotScope::ClaimsAttest),
            "intents.attest" => Ok(BotScope::IntentsAttest),
            other => Err(format!("unknown bot scope: {other}")),
        }
    }
}

/// Stage a request reached before it was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStage {
    Unverified,
    SignatureChecked,
    ScopeChecked,
    Authorized,
}

impl AuthStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStage::Unverified => "UNVERIFIED",
            AuthStage::SignatureChecked => "SIGNATURE_CHECKED",
            AuthStage::ScopeChecked => "SCOPE_CHECKED",
            AuthStage::Authorized => "AUTHORIZED",
        }
    }
}

/// Bot identity after a successful check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedBot {
    pub bot_id: String,
    /// Recovered signer, equal to the on-file address for registered bots
    pub address: Address,
    pub roles: BTreeSet<BotRole>,
    pub scopes: BTreeSet<BotScope>,
    pub registered: bool,
}

/// Raw auth headers of one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotCredentials {
    pub bot_id: String,
    pub signature: String,
    pub timestamp: i64,
    pub nonce: String,
}

impl BotCredentials {
    pub fn from_headers(headers: &HeaderMap) -> ApiResult<Self> {
        let bot_id = required_header(headers, HEADER_BOT_ID)?;
        let signature = required_header(headers, HEADER_BOT_SIGNATURE)?;
        let timestamp = required_header(headers, HEADER_BOT_TIMESTAMP)?;
        let nonce = required_header(headers, HEADER_BOT_NONCE)?;
        let timestamp = timestamp.parse::<i64>().map_err(|_| {
            ApiError::unauthorized(format!("{HEADER_BOT_TIMESTAMP} must be unix seconds"))
        })?;
        Ok(Self {
            bot_id,
            signature,
            timestamp,
            nonce,
        })
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> ApiResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized(format!("missing header {name}")))
}

/// Signature, nonce and scope checks for bot requests
#[derive(Clone)]
pub struct BotAuthGateway {
    bots: Arc<dyn BotRepository>,
    nonces: Arc<dyn BotNonceRepository>,
    memberships: Arc<dyn MembershipRepository>,
    window_secs: i64,
}

impl BotAuthGateway {
    pub fn new(
        bots: Arc<dyn BotRepository>,
        nonces: Arc<dyn BotNonceRepository>,
        memberships: Arc<dyn MembershipRepository>,
    ) -> Self {
        Self {
            bots,
            nonces,
            memberships,
            window_secs: BOT_REQUEST_WINDOW_SECS,
        }
    }

    /// Authenticate a request that needs every scope in `required`
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        required: &[BotScope],
        now: DateTime<Utc>,
    ) -> ApiResult<AuthenticatedBot> {
        let credentials = BotCredentials::from_headers(headers)?;
        let bot_id = credentials.bot_id.clone();
        self.authorize(credentials, required, now)
            .await
            .map_err(|(stage, err)| {
                tracing::warn!(
                    bot_id = %bot_id,
                    stage = stage.as_str(),
                    error = %err,
                    "bot request rejected"
                );
                err
            })
    }

    async fn authorize(
        &self,
        credentials: BotCredentials,
        required: &[BotScope],
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedBot, (AuthStage, ApiError)> {
        let mut stage = AuthStage::Unverified;
        let reject = |stage: AuthStage| move |err: ApiError| (stage, err);

        assert_timestamp_within_window(credentials.timestamp, now.timestamp(), self.window_secs)
            .map_err(|e| ApiError::unauthorized(e.to_string()))
            .map_err(reject(stage))?;

        let recovered = recover_bot_signer(
            &credentials.bot_id,
            credentials.timestamp,
            &credentials.nonce,
            &credentials.signature,
        )
        .map_err(|e| ApiError::unauthorized(format!("invalid bot signature: {e}")))
        .map_err(reject(stage))?;

        let registered = self
            .bots
            .get(&credentials.bot_id)
            .await
            .map_err(ApiError::from)
            .map_err(reject(stage))?;

        let (roles, registered) = match registered {
            Some(bot) if bot.address == recovered => (bot.roles, true),
            Some(_) => {
                return Err((
                    stage,
                    ApiError::unauthorized("signature does not match registered bot address"),
                ))
            }
            None if required.is_empty() => (BTreeSet::new(), false),
            None => {
                return Err((
                    stage,
                    ApiError::unauthorized(format!("bot {} is not registered", credentials.bot_id)),
                ))
            }
        };
        stage = AuthStage::SignatureChecked;

        let fresh = self
            .nonces
            .insert_if_absent(&credentials.bot_id, &credentials.nonce, now)
            .await
            .map_err(ApiError::from)
            .map_err(reject(stage))?;
        if !fresh {
            return Err((
                stage,
                ApiError::NonceReused {
                    bot_id: credentials.bot_id,
                    nonce: credentials.nonce,
                },
            ));
        }

        let scopes = BotScope::for_roles(&roles);
        if let Some(missing) = required.iter().find(|s| !scopes.contains(s)) {
            return Err((
                stage,
                ApiError::forbidden(format!("missing scope {missing}")),
            ));
        }

        tracing::debug!(
            bot_id = %credentials.bot_id,
            stage = AuthStage::Authorized.as_str(),
            registered,
            "bot request authorized"
        );
        Ok(AuthenticatedBot {
            bot_id: credentials.bot_id,
            address: recovered,
            roles,
            scopes,
            registered,
        })
    }

    /// Require an ACTIVE membership of `bot` in the fund with one of `allowed` roles
    pub async fn require_fund_role(
        &self,
        fund_id: &str,
        bot: &AuthenticatedBot,
        allowed: &[BotRole],
    ) -> ApiResult<BotRole> {
        let membership = self.memberships.get(fund_id, &bot.bot_id).await?;
        match membership {
            Some(m) if m.is_active() && allowed.contains(&m.role) => Ok(m.role),
            Some(m) if !m.is_active() => Err(ApiError::forbidden(format!(
                "bot {} is disabled in fund {fund_id}",
                bot.bot_id
            ))),
            Some(m) => Err(ApiError::forbidden(format!(
                "role {} may not call this endpoint for fund {fund_id}",
                m.role
            ))),
            None => Err(ApiError::forbidden(format!(
                "bot {} is not a member of fund {fund_id}",
                bot.bot_id
            ))),
        }
    }

    /// Drop one-time nonces that fell out of the request window
    pub async fn prune_nonces(&self, now: DateTime<Utc>) -> ApiResult<usize> {
        let cutoff = now - chrono::Duration::seconds(self.window_secs * 2);
        Ok(self.nonces.prune_before(cutoff).await?)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{key, signed_headers};
    use super::*;
    use axum::http::StatusCode;
    use claw_store::{
        FundBotMembership, MembershipStatus, MemoryBotNonceRepository, MemoryBotRepository,
        MemoryMembershipRepository,
    };

    struct Fixture {
        gateway: BotAuthGateway,
        bots: Arc<MemoryBotRepository>,
        memberships: Arc<MemoryMembershipRepository>,
    }

    fn fixture() -> Fixture {
        let bots = Arc::new(MemoryBotRepository::new());
        let memberships = Arc::new(MemoryMembershipRepository::new());
        let gateway = BotAuthGateway::new(
            bots.clone(),
            Arc::new(MemoryBotNonceRepository::new()),
            memberships.clone(),
        );
        Fixture {
            gateway,
            bots,
            memberships,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_role_scope_table() {
        let strategy = BotScope::for_roles(&[BotRole::Strategy]);
        assert!(strategy.contains(&BotScope::IntentsPropose));
        assert!(!strategy.contains(&BotScope::ClaimsAttest));

        let both = BotScope::for_roles(&[BotRole::Strategy, BotRole::Participant]);
        assert_eq!(both.len(), 6);

        assert_eq!("claims.attest".parse::<BotScope>().unwrap(), BotScope::ClaimsAttest);
        assert!("claims.delete".parse::<BotScope>().is_err());
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let f = fixture();
        let mut headers = signed_headers(&key(3), "bot-1", 1_700_000_000, "n-1");
        headers.remove(HEADER_BOT_NONCE);
        let err = f.gateway.authenticate(&headers, &[], now()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unregistered_bot_only_without_scopes() {
        let f = fixture();
        let signer = key(3);

        let headers = signed_headers(&signer, "bot-auth-1", 1_700_000_000, "nonce-1");
        let bot = f.gateway.authenticate(&headers, &[], now()).await.unwrap();
        assert_eq!(bot.address, signer.address());
        assert!(!bot.registered);
        assert!(bot.scopes.is_empty());

        let headers = signed_headers(&signer, "bot-auth-1", 1_700_000_000, "nonce-2");
        let err = f
            .gateway
            .authenticate(&headers, &[BotScope::ClaimsSubmit], now())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_timestamp_window() {
        let f = fixture();
        let signer = key(3);

        let edge = signed_headers(&signer, "bot-1", 1_700_000_000 - 300, "n-1");
        assert!(f.gateway.authenticate(&edge, &[], now()).await.is_ok());

        let stale = signed_headers(&signer, "bot-1", 1_700_000_000 - 301, "n-2");
        let err = f.gateway.authenticate(&stale, &[], now()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_registered_bot_needs_matching_address_and_scope() {
        let f = fixture();
        let signer = key(4);
        f.bots
            .upsert_role("strategy-1", signer.address(), BotRole::Strategy, now())
            .await
            .unwrap();

        let headers = signed_headers(&signer, "strategy-1", 1_700_000_000, "n-1");
        let bot = f
            .gateway
            .authenticate(&headers, &[BotScope::IntentsPropose], now())
            .await
            .unwrap();
        assert!(bot.registered);
        assert!(bot.roles.contains(&BotRole::Strategy));

        let headers = signed_headers(&signer, "strategy-1", 1_700_000_000, "n-2");
        let err = f
            .gateway
            .authenticate(&headers, &[BotScope::ClaimsAttest], now())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let impostor = signed_headers(&key(5), "strategy-1", 1_700_000_000, "n-3");
        let err = f.gateway.authenticate(&impostor, &[], now()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_nonce_single_use() {
        let f = fixture();
        let headers = signed_headers(&key(3), "bot-1", 1_700_000_000, "same");
        assert!(f.gateway.authenticate(&headers, &[], now()).await.is_ok());

        let err = f.gateway.authenticate(&headers, &[], now()).await.unwrap_err();
        assert!(matches!(err, ApiError::NonceReused { .. }));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        // another bot may reuse the nonce string
        let other = signed_headers(&key(4), "bot-2", 1_700_000_000, "same");
        assert!(f.gateway.authenticate(&other, &[], now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_tampered_request_rejected() {
        let f = fixture();
        let signer = key(3);
        f.bots
            .upsert_role("participant-1", signer.address(), BotRole::Participant, now())
            .await
            .unwrap();

        // signed for one nonce, sent with another: recovers a different address
        let mut headers = signed_headers(&signer, "participant-1", 1_700_000_000, "n-1");
        headers.insert(HEADER_BOT_NONCE, "n-other".parse().unwrap());
        let err = f.gateway.authenticate(&headers, &[], now()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let mut headers = signed_headers(&signer, "participant-1", 1_700_000_000, "n-2");
        headers.insert(HEADER_BOT_SIGNATURE, "0x1234".parse().unwrap());
        let err = f.gateway.authenticate(&headers, &[], now()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_fund_role() {
        let f = fixture();
        let bot = AuthenticatedBot {
            bot_id: "participant-1".into(),
            address: Address::repeat_byte(0x11),
            roles: BTreeSet::from([BotRole::Participant]),
            scopes: BotScope::for_roles(&[BotRole::Participant]),
            registered: true,
        };

        let err = f
            .gateway
            .require_fund_role("fund-1", &bot, &[BotRole::Participant])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        f.memberships
            .add(FundBotMembership {
                fund_id: "fund-1".into(),
                bot_id: "participant-1".into(),
                role: BotRole::Participant,
                address: bot.address,
                status: MembershipStatus::Active,
                created_at: now(),
            })
            .await
            .unwrap();
        let role = f
            .gateway
            .require_fund_role("fund-1", &bot, &[BotRole::Participant])
            .await
            .unwrap();
        assert_eq!(role, BotRole::Participant);

        let err = f
            .gateway
            .require_fund_role("fund-1", &bot, &[BotRole::Strategy])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
