//! Invoice Engine: billable amounts and exactly-once issuance per obligation.

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db::invoices::{self as invoice_db, NewInvoice};
use crate::db::{deliveries as delivery_db, projects as project_db};
use crate::error::{CoreError, CoreResult};
use crate::models::invoices::{self, Obligation, ObligationType};
use crate::models::{deliveries, ecommerce_payments, orders, projects};
use crate::money::Money;

/// Fee rate and payment window applied to every new invoice.
#[derive(Debug, Clone, Copy)]
pub struct InvoicePolicy {
    pub fee_bps: i64,
    pub timeout: Duration,
}

impl InvoicePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fee_bps: config.platform_fee_bps,
            timeout: Duration::hours(config.invoice_timeout_hours),
        }
    }

    /// Due date for an invoice issued at `now`, on a whole second.
    pub fn due_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        (now + self.timeout).trunc_subsecs(0)
    }

    pub fn fee(&self, base: Money) -> Money {
        base.percentage_bps(self.fee_bps)
    }

    pub fn amounts(&self, base: Money) -> Amounts {
        Amounts {
            base,
            fee: self.fee(base),
        }
    }
}

/// `total = base + fee`, each already rounded to the minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amounts {
    pub base: Money,
    pub fee: Money,
}

impl Amounts {
    pub fn total(&self) -> Money {
        self.base + self.fee
    }
}

/// Billable days: `max(1, end − start + 1)`.
pub fn project_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(1)
}

/// Base amount of a work project before fees.
pub fn work_base(project: &projects::Model) -> CoreResult<Money> {
    let workers = i64::from(project.workers_needed);
    let units = match project.payment_type {
        projects::PaymentType::PerDay => {
            project_days(project.start_date, project.end_date).checked_mul(workers)
        }
        projects::PaymentType::LumpSum => Some(workers),
    };

    units
        .and_then(|n| project.payment_rate.checked_mul(n))
        .ok_or_else(|| CoreError::InvalidInput("project amount is out of range".to_string()))
}

/// Per-order fee shares of an e-commerce invoice.
pub fn ecommerce_amounts(policy: &InvoicePolicy, orders: &[orders::Model]) -> Amounts {
    let grand_total: Money = orders.iter().map(|o| o.total_amount).sum();
    let fee: Money = orders.iter().map(|o| policy.fee(o.total_amount)).sum();
    Amounts {
        base: grand_total - fee,
        fee,
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceEngine {
    policy: InvoicePolicy,
}

impl InvoiceEngine {
    pub fn new(policy: InvoicePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &InvoicePolicy {
        &self.policy
    }

    /// Issue the first invoice for an obligation, or return the one that
    /// already exists.
    pub async fn create_invoice<C: ConnectionTrait>(
        &self,
        conn: &C,
        obligation: Obligation,
        payer_id: Uuid,
        amounts: Amounts,
    ) -> CoreResult<invoices::Model> {
        if let Some(existing) = invoice_db::latest_invoice_for(conn, obligation).await? {
            return Ok(existing);
        }

        let inserted = invoice_db::insert_invoice_if_absent(
            conn,
            NewInvoice {
                obligation,
                attempt: 1,
                payer_id,
                amount: amounts.base,
                platform_fee: amounts.fee,
                due_date: self.policy.due_date(Utc::now()),
            },
        )
        .await?;

        let invoice = invoice_db::latest_invoice_for(conn, obligation)
            .await?
            .ok_or_else(|| {
                CoreError::IntegrityViolation(format!(
                    "invoice for {:?} {} vanished after insert",
                    obligation.kind, obligation.id
                ))
            })?;

        if inserted {
            info!(
                invoice_id = %invoice.id,
                obligation = ?obligation.kind,
                obligation_id = %obligation.id,
                total = %invoice.total_amount,
                "Invoice issued"
            );
        }
        Ok(invoice)
    }

    /// Emit the project invoice once the project is fully staffed. The caller
    /// holds the project row lock.
    pub async fn issue_for_project_if_staffed<C: ConnectionTrait>(
        &self,
        conn: &C,
        project: projects::Model,
    ) -> CoreResult<Option<(invoices::Model, projects::Model)>> {
        let staffed = project_db::count_staffed_assignments(conn, project.id).await?;
        if staffed < project.workers_needed as u64 {
            return Ok(None);
        }

        let obligation = Obligation::project(project.id);
        if invoice_db::latest_invoice_for(conn, obligation).await?.is_some() {
            return Ok(None);
        }

        let amounts = self.policy.amounts(work_base(&project)?);
        let invoice = self
            .create_invoice(conn, obligation, project.farmer_id, amounts)
            .await?;
        let project =
            project_db::update_project_status(conn, project, projects::Status::WaitingPayment)
                .await?;
        info!(project_id = %project.id, "Project fully staffed, waiting for payment");

        Ok(Some((invoice, project)))
    }

    pub async fn issue_for_delivery<C: ConnectionTrait>(
        &self,
        conn: &C,
        delivery: &deliveries::Model,
    ) -> CoreResult<invoices::Model> {
        let amounts = self.policy.amounts(delivery.price);
        self.create_invoice(
            conn,
            Obligation::delivery(delivery.id),
            delivery.farmer_id,
            amounts,
        )
        .await
    }

    pub async fn issue_for_payment<C: ConnectionTrait>(
        &self,
        conn: &C,
        payment: &ecommerce_payments::Model,
        orders: &[orders::Model],
    ) -> CoreResult<invoices::Model> {
        let amounts = ecommerce_amounts(&self.policy, orders);
        if amounts.total() != payment.grand_total {
            return Err(CoreError::IntegrityViolation(format!(
                "payment {} grand total {} does not match its orders ({})",
                payment.id,
                payment.grand_total,
                amounts.total()
            )));
        }
        self.create_invoice(
            conn,
            Obligation::ecommerce(payment.id),
            payment.customer_id,
            amounts,
        )
        .await
    }

    /// Issue a fresh attempt for an obligation whose latest invoice failed.
    pub async fn reissue(
        &self,
        db: &DatabaseConnection,
        invoice_id: Uuid,
        farmer_id: Uuid,
    ) -> CoreResult<invoices::Model> {
        let txn = db.begin().await?;

        let failed = invoice_db::lock_invoice(&txn, invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;

        if failed.payer_id != farmer_id {
            return Err(CoreError::Forbidden(
                "Only the payer can reissue this invoice".to_string(),
            ));
        }
        if failed.status != invoices::Status::Failed {
            return Err(CoreError::IllegalState(
                "Only failed invoices can be reissued".to_string(),
            ));
        }

        let obligation = failed.obligation();
        let latest = invoice_db::latest_invoice_for(&txn, obligation).await?;
        if latest.as_ref().map(|i| i.id) != Some(failed.id) {
            return Err(CoreError::IllegalState(format!(
                "Invoice {invoice_id} has already been reissued"
            )));
        }

        let amounts = match obligation.kind {
            ObligationType::Project => {
                let project = project_db::lock_project(&txn, obligation.id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Project", obligation.id))?;
                if project.status != projects::Status::WaitingPayment {
                    return Err(CoreError::IllegalState(
                        "Project is no longer waiting for payment".to_string(),
                    ));
                }
                self.policy.amounts(work_base(&project)?)
            }
            ObligationType::Delivery => {
                let delivery = delivery_db::lock_delivery(&txn, obligation.id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Delivery", obligation.id))?;
                if delivery.status != deliveries::Status::PendingSignature {
                    return Err(CoreError::IllegalState(
                        "Delivery is no longer awaiting payment".to_string(),
                    ));
                }
                self.policy.amounts(delivery.price)
            }
            ObligationType::Ecommerce => {
                return Err(CoreError::IllegalState(
                    "E-commerce payments are retried with a new checkout".to_string(),
                ));
            }
        };

        let attempt = failed.attempt + 1;
        invoice_db::insert_invoice_if_absent(
            &txn,
            NewInvoice {
                obligation,
                attempt,
                payer_id: failed.payer_id,
                amount: amounts.base,
                platform_fee: amounts.fee,
                due_date: self.policy.due_date(Utc::now()),
            },
        )
        .await?;

        let invoice = invoice_db::latest_invoice_for(&txn, obligation)
            .await?
            .filter(|i| i.attempt == attempt)
            .ok_or_else(|| {
                CoreError::Conflict(format!("Invoice {invoice_id} is being reissued concurrently"))
            })?;

        txn.commit().await?;

        info!(
            invoice_id = %invoice.id,
            previous_invoice_id = %invoice_id,
            attempt,
            "Invoice reissued"
        );
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(payment_type: projects::PaymentType, rate: i64, workers: i32) -> projects::Model {
        projects::Model {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            title: "Harvest".into(),
            description: String::new(),
            location: "Bogor".into(),
            workers_needed: workers,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            payment_type,
            payment_rate: Money::from_major(rate),
            status: projects::Status::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn policy() -> InvoicePolicy {
        InvoicePolicy {
            fee_bps: 500,
            timeout: Duration::hours(48),
        }
    }

    #[test]
    fn test_project_days_is_inclusive_and_at_least_one() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        assert_eq!(project_days(d(1), d(3)), 3);
        assert_eq!(project_days(d(1), d(1)), 1);
        assert_eq!(project_days(d(3), d(1)), 1);
    }

    #[test]
    fn test_per_day_amounts() {
        let p = project(projects::PaymentType::PerDay, 100_000, 2);
        let amounts = policy().amounts(work_base(&p).unwrap());
        assert_eq!(amounts.base, Money::from_major(600_000));
        assert_eq!(amounts.fee, Money::from_major(30_000));
        assert_eq!(amounts.total(), Money::from_major(630_000));
    }

    #[test]
    fn test_lump_sum_ignores_duration() {
        let p = project(projects::PaymentType::LumpSum, 250_000, 3);
        assert_eq!(work_base(&p).unwrap(), Money::from_major(750_000));
    }

    #[test]
    fn test_overflow_is_invalid_input() {
        let mut p = project(projects::PaymentType::PerDay, 1, 1000);
        p.payment_rate = Money(i64::MAX / 2);
        assert!(matches!(work_base(&p), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_ecommerce_fee_is_sum_of_order_fees() {
        let order = |total| orders::Model {
            id: Uuid::new_v4(),
            invoice_number: "INV".into(),
            seller_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            total_amount: Money(total),
            status: orders::Status::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        // 5 % of 30 is 1.5 → 2; of 50 is 2.5 → 2.
        let amounts = ecommerce_amounts(&policy(), &[order(30), order(50)]);
        assert_eq!(amounts.fee, Money(4));
        assert_eq!(amounts.base, Money(76));
        assert_eq!(amounts.total(), Money(80));
    }

    #[test]
    fn test_due_date_is_whole_seconds() {
        let now = Utc::now();
        let due = policy().due_date(now);
        assert_eq!(due.timestamp_subsec_nanos(), 0);
        assert!(due > now + Duration::hours(47));
    }
}
