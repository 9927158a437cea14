//! Common types used across the sinalpay services

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Payment gateway identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Asaas,
    Abacatepay,
    Suitpay,
    Secretpay,
    Faturefy,
}

impl Provider {
    /// All supported gateways, in registry order
    pub const ALL: [Provider; 5] = [
        Self::Asaas,
        Self::Abacatepay,
        Self::Suitpay,
        Self::Secretpay,
        Self::Faturefy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asaas => "asaas",
            Self::Abacatepay => "abacatepay",
            Self::Suitpay => "suitpay",
            Self::Secretpay => "secretpay",
            Self::Faturefy => "faturefy",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asaas" => Ok(Self::Asaas),
            "abacatepay" => Ok(Self::Abacatepay),
            "suitpay" => Ok(Self::Suitpay),
            "secretpay" => Ok(Self::Secretpay),
            // PayLatam is the white-label name some dashboards show for Faturefy
            "faturefy" | "paylatam" => Ok(Self::Faturefy),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

/// Payment transaction state
///
/// `pending` is initial; `paid` and `failed` are terminal and never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Paid,
    Failed,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::Pending
    }
}

impl TransactionState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TransactionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid transaction state: {}", s)),
        }
    }
}

/// Withdrawal request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
}

impl Default for WithdrawalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl WithdrawalStatus {
    /// Terminal statuses accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid withdrawal status: {}", s)),
        }
    }
}

/// Subscription plan tier
///
/// Ordering matters: a paid webhook may only move a profile's headline plan
/// upward in this ranking, never downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Partner,
    Master,
    Pro,
    Premium,
    Platinum,
}

impl Default for PlanTier {
    fn default() -> Self {
        Self::Free
    }
}

impl PlanTier {
    /// Position in the tier ordering (higher = better plan)
    /// free: 0, partner: 1, master: 2, pro: 3, premium: 4, platinum: 5
    pub fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Partner => 1,
            Self::Master => 2,
            Self::Pro => 3,
            Self::Premium => 4,
            Self::Platinum => 5,
        }
    }

    /// Whether switching to `new` from this tier is an upgrade or a lateral
    /// move (equal rank counts, so a re-purchase refreshes the same plan)
    pub fn allows_promotion_to(&self, new: PlanTier) -> bool {
        new.rank() >= self.rank()
    }

    /// Parse a tier from string (case insensitive)
    /// Unknown names rank as Free so they can never block a real promotion
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "free" => Self::Free,
            "partner" => Self::Partner,
            "master" => Self::Master,
            "pro" => Self::Pro,
            "premium" => Self::Premium,
            "platinum" => Self::Platinum,
            _ => Self::Free,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Partner => write!(f, "partner"),
            Self::Master => write!(f, "master"),
            Self::Pro => write!(f, "pro"),
            Self::Premium => write!(f, "premium"),
            Self::Platinum => write!(f, "platinum"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "partner" => Ok(Self::Partner),
            "master" => Ok(Self::Master),
            "pro" => Ok(Self::Pro),
            "premium" => Ok(Self::Premium),
            "platinum" => Ok(Self::Platinum),
            _ => Err(format!("Invalid plan tier: {}", s)),
        }
    }
}

/// PIX key type accepted for withdrawals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PixKeyType {
    Cpf,
    Cnpj,
    Email,
    Phone,
    Random,
}

impl std::fmt::Display for PixKeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpf => write!(f, "cpf"),
            Self::Cnpj => write!(f, "cnpj"),
            Self::Email => write!(f, "email"),
            Self::Phone => write!(f, "phone"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for PixKeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpf" => Ok(Self::Cpf),
            "cnpj" => Ok(Self::Cnpj),
            "email" => Ok(Self::Email),
            // some gateways spell it "telefone" / "aleatoria" in their payloads
            "phone" | "telefone" => Ok(Self::Phone),
            "random" | "evp" | "aleatoria" => Ok(Self::Random),
            _ => Err(format!("Invalid pix key type: {}", s)),
        }
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Payment transaction: one purchase attempt against one gateway
///
/// `external_id` is the idempotency key chosen before contacting the gateway;
/// unique per provider. Inbound webhooks and polls correlate through
/// `(provider, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub external_id: String,
    pub provider_transaction_id: Option<String>,
    pub user_id: Uuid,
    pub plan_name: String,
    pub amount: Decimal,
    pub provider: Provider,
    pub state: TransactionState,
    pub raw_provider_payload: Option<serde_json::Value>,
    pub paid_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Purchased tier; unknown plan names rank as Free
    pub fn plan_tier(&self) -> PlanTier {
        PlanTier::from_str_lossy(&self.plan_name)
    }
}

/// One active subscription tier instance owned by a user
///
/// `daily_signals_used` is reset by the dashboard subsystem; reconciliation
/// only initializes it to zero at creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_name: String,
    pub is_active: bool,
    pub purchase_date: OffsetDateTime,
    pub daily_signals_used: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Outbound PIX transfer attempt
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub pix_key: String,
    pub pix_key_type: String,
    pub status: WithdrawalStatus,
    pub provider: Option<Provider>,
    pub provider_transfer_id: Option<String>,
    pub transfer_data: Option<serde_json::Value>,
    pub processed_at: Option<OffsetDateTime>,
    pub admin_notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// User profile fields owned by the wider platform
///
/// Reconciliation touches `plan` (headline tier, promoted on purchase) and
/// `available_balance` (debited at withdrawal creation, refunded on
/// rejection) only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub plan: String,
    pub available_balance: Decimal,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Profile {
    /// Current headline tier; unknown names rank as Free
    pub fn plan_tier(&self) -> PlanTier {
        PlanTier::from_str_lossy(&self.plan)
    }
}

// =============================================================================
// Tests
// =============================================================================
