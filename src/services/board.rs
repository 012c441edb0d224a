//! Marketplace board: projects, applications and deliveries before a match is made.

use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::db::{deliveries as delivery_db, projects as project_db, users as user_db};
use crate::error::{CoreError, CoreResult};
use crate::models::deliveries::{self, CreateDelivery, Location};
use crate::models::project_applications::{self as applications, CreateApplication};
use crate::models::projects::{self, CreateProject};
use crate::models::users::Roles;
use crate::money::Money;

/// Shared checks for open projects and direct offers.
pub fn validate_terms(
    workers_needed: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    payment_rate: Money,
) -> CoreResult<()> {
    if workers_needed < 1 {
        return Err(CoreError::InvalidInput(
            "workers_needed must be at least 1".to_string(),
        ));
    }
    if start_date > end_date {
        return Err(CoreError::InvalidInput(
            "start_date must not be after end_date".to_string(),
        ));
    }
    if !payment_rate.is_positive() {
        return Err(CoreError::InvalidInput(
            "payment_rate must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_location(field: &str, location: &Location) -> CoreResult<()> {
    if location.address.trim().is_empty() {
        return Err(CoreError::InvalidInput(format!("{field} address is required")));
    }
    if !(-90.0..=90.0).contains(&location.lat) || !(-180.0..=180.0).contains(&location.lng) {
        return Err(CoreError::InvalidInput(format!(
            "{field} coordinates are out of range"
        )));
    }
    Ok(())
}

/// `DLV-` followed by ten uppercase hex digits.
pub fn generate_tracking_code() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("DLV-{}", &hex[..10])
}

pub async fn create_project(
    db: &DatabaseConnection,
    farmer_id: Uuid,
    input: CreateProject,
) -> CoreResult<projects::Model> {
    if input.title.trim().is_empty() {
        return Err(CoreError::InvalidInput("title is required".to_string()));
    }
    validate_terms(
        input.workers_needed,
        input.start_date,
        input.end_date,
        input.payment_rate,
    )?;

    let project = project_db::insert_project(db, farmer_id, input, projects::Status::Open).await?;
    info!(project_id = %project.id, farmer_id = %farmer_id, "Project created");
    Ok(project)
}

pub async fn apply(
    db: &DatabaseConnection,
    project_id: Uuid,
    worker_id: Uuid,
    input: CreateApplication,
) -> CoreResult<applications::Model> {
    let txn = db.begin().await?;

    let project = project_db::lock_project(&txn, project_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Project", project_id))?;

    if project.farmer_id == worker_id {
        return Err(CoreError::Forbidden(
            "You cannot apply to your own project".to_string(),
        ));
    }
    if project.status != projects::Status::Open {
        return Err(CoreError::IllegalState(
            "Project is not open for applications".to_string(),
        ));
    }
    if project_db::find_application(&txn, project_id, worker_id)
        .await?
        .is_some()
    {
        return Err(CoreError::IllegalState(
            "You have already applied to this project".to_string(),
        ));
    }

    let application =
        project_db::insert_application(&txn, project_id, worker_id, input.message).await?;
    txn.commit().await?;

    info!(application_id = %application.id, project_id = %project_id, "Application submitted");
    Ok(application)
}

pub async fn withdraw_application(
    db: &DatabaseConnection,
    application_id: Uuid,
    worker_id: Uuid,
) -> CoreResult<applications::Model> {
    let txn = db.begin().await?;

    let application = project_db::lock_application(&txn, application_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Application", application_id))?;

    if application.worker_id != worker_id {
        return Err(CoreError::Forbidden(
            "You can only withdraw your own application".to_string(),
        ));
    }
    if application.status != applications::Status::Pending {
        return Err(CoreError::IllegalState(
            "Only pending applications can be withdrawn".to_string(),
        ));
    }

    let application = project_db::update_application_status(
        &txn,
        application,
        applications::Status::Withdrawn,
    )
    .await?;
    txn.commit().await?;
    Ok(application)
}

pub async fn reject_application(
    db: &DatabaseConnection,
    application_id: Uuid,
    farmer_id: Uuid,
) -> CoreResult<applications::Model> {
    let txn = db.begin().await?;

    let application = project_db::lock_application(&txn, application_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Application", application_id))?;
    let project = project_db::get_project_by_id(&txn, application.project_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Project", application.project_id))?;

    if project.farmer_id != farmer_id {
        return Err(CoreError::Forbidden(
            "Only the project owner can reject applications".to_string(),
        ));
    }
    if application.status != applications::Status::Pending {
        return Err(CoreError::IllegalState(
            "Only pending applications can be rejected".to_string(),
        ));
    }

    let application =
        project_db::update_application_status(&txn, application, applications::Status::Rejected)
            .await?;
    txn.commit().await?;
    Ok(application)
}

pub async fn create_delivery(
    db: &DatabaseConnection,
    farmer_id: Uuid,
    input: CreateDelivery,
) -> CoreResult<deliveries::Model> {
    validate_location("pickup", &input.pickup)?;
    validate_location("destination", &input.destination)?;
    if input.item_description.trim().is_empty() {
        return Err(CoreError::InvalidInput(
            "item_description is required".to_string(),
        ));
    }
    if !(input.item_weight > 0.0) {
        return Err(CoreError::InvalidInput(
            "item_weight must be positive".to_string(),
        ));
    }
    if !input.price.is_positive() {
        return Err(CoreError::InvalidInput("price must be positive".to_string()));
    }

    let farmer = user_db::get_user_by_id(db, farmer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", farmer_id))?;
    if farmer.role != Roles::Farmer {
        return Err(CoreError::Forbidden(
            "Only farmers can request deliveries".to_string(),
        ));
    }

    let delivery =
        delivery_db::insert_delivery(db, farmer_id, generate_tracking_code(), input).await?;
    info!(
        delivery_id = %delivery.id,
        tracking_code = %delivery.tracking_code,
        "Delivery requested"
    );
    Ok(delivery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn test_validate_terms() {
        assert!(validate_terms(1, d(1), d(1), Money(1)).is_ok());
        assert!(validate_terms(0, d(1), d(2), Money(1)).is_err());
        assert!(validate_terms(1, d(3), d(2), Money(1)).is_err());
        assert!(validate_terms(1, d(1), d(2), Money::ZERO).is_err());
    }

    #[test]
    fn test_tracking_code_shape() {
        let code = generate_tracking_code();
        assert!(code.starts_with("DLV-"));
        assert_eq!(code.len(), 14);
        assert_ne!(code, generate_tracking_code());
    }
}
