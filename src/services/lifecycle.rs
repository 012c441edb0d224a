//! Project and delivery lifecycle after the match: completion, transit and
//! cancellation.
//!
//! Lock order everywhere: invoice, then project or delivery, then contracts,
//! assignments and applications.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::db::{
    contracts as contract_db, deliveries as delivery_db, invoices as invoice_db,
    projects as project_db,
};
use crate::error::{CoreError, CoreResult};
use crate::models::invoices::{self, Obligation};
use crate::models::project_applications as applications;
use crate::models::project_assignments as assignments;
use crate::models::{contracts, deliveries, projects};
use crate::services::payments::settlement;

async fn latest_invoice_is_paid<C: ConnectionTrait>(
    conn: &C,
    obligation: Obligation,
) -> CoreResult<bool> {
    Ok(invoice_db::latest_invoice_for(conn, obligation)
        .await?
        .is_some_and(|i| i.status == invoices::Status::Paid))
}

/// Complete the project once every staffed assignment is done and the
/// invoice is paid. Its work contracts complete with it.
async fn finalize_project_if_done<C: ConnectionTrait>(
    conn: &C,
    project: projects::Model,
) -> CoreResult<projects::Model> {
    if project.status != projects::Status::InProgress {
        return Ok(project);
    }

    let staffed = project_db::list_staffed_assignments(conn, project.id).await?;
    let all_done = !staffed.is_empty()
        && staffed
            .iter()
            .all(|a| a.status == assignments::Status::Completed);
    if !all_done || !latest_invoice_is_paid(conn, Obligation::project(project.id)).await? {
        return Ok(project);
    }

    for contract in contract_db::lock_open_contracts_for_project(conn, project.id).await? {
        contract_db::update_contract_status(conn, contract, contracts::Status::Completed).await?;
    }
    let project =
        project_db::update_project_status(conn, project, projects::Status::Completed).await?;
    info!(project_id = %project.id, "Project completed");
    Ok(project)
}

/// The farmer attests an assignment's work as done.
pub async fn complete_assignment(
    db: &DatabaseConnection,
    assignment_id: Uuid,
    farmer_id: Uuid,
) -> CoreResult<(assignments::Model, projects::Model)> {
    let txn = db.begin().await?;

    let peek = project_db::get_assignment_by_id(&txn, assignment_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Assignment", assignment_id))?;
    let project = project_db::lock_project(&txn, peek.project_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Project", peek.project_id))?;
    let assignment = project_db::lock_assignment(&txn, assignment_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Assignment", assignment_id))?;

    if project.farmer_id != farmer_id {
        return Err(CoreError::Forbidden(
            "Only the project owner can complete assignments".to_string(),
        ));
    }
    if project.status != projects::Status::InProgress {
        return Err(CoreError::IllegalState(
            "Project is not in progress".to_string(),
        ));
    }
    if !assignments::Status::ACTIVE.contains(&assignment.status) {
        return Err(CoreError::IllegalState(format!(
            "Assignment is already {:?}",
            assignment.status
        )));
    }

    let assignment =
        project_db::update_assignment_status(&txn, assignment, assignments::Status::Completed)
            .await?;
    info!(assignment_id = %assignment.id, worker_id = %assignment.worker_id, "Assignment completed");
    let project = finalize_project_if_done(&txn, project).await?;

    txn.commit().await?;
    Ok((assignment, project))
}

/// The driver picks up the goods. Needs an active contract and a paid invoice.
pub async fn start_delivery(
    db: &DatabaseConnection,
    delivery_id: Uuid,
    driver_id: Uuid,
) -> CoreResult<deliveries::Model> {
    let txn = db.begin().await?;

    let delivery = delivery_db::lock_delivery(&txn, delivery_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Delivery", delivery_id))?;

    if delivery.driver_id != Some(driver_id) {
        return Err(CoreError::Forbidden(
            "Only the assigned driver can start this delivery".to_string(),
        ));
    }
    if delivery.status != deliveries::Status::PendingSignature {
        return Err(CoreError::IllegalState(
            "Delivery cannot be started from its current status".to_string(),
        ));
    }

    let contract_active = match delivery.contract_id {
        Some(contract_id) => contract_db::get_contract_by_id(&txn, contract_id)
            .await?
            .is_some_and(|c| c.status == contracts::Status::Active),
        None => false,
    };
    if !contract_active {
        return Err(CoreError::IllegalState(
            "Delivery contract has not been signed".to_string(),
        ));
    }
    if !latest_invoice_is_paid(&txn, Obligation::delivery(delivery.id)).await? {
        return Err(CoreError::IllegalState(
            "Delivery invoice has not been paid".to_string(),
        ));
    }

    let delivery =
        delivery_db::update_delivery_status(&txn, delivery, deliveries::Status::InTransit).await?;
    txn.commit().await?;

    info!(delivery_id = %delivery.id, "Delivery in transit");
    Ok(delivery)
}

/// The driver hands over the goods; the contract completes.
pub async fn mark_delivered(
    db: &DatabaseConnection,
    delivery_id: Uuid,
    driver_id: Uuid,
) -> CoreResult<deliveries::Model> {
    let txn = db.begin().await?;

    let delivery = delivery_db::lock_delivery(&txn, delivery_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Delivery", delivery_id))?;

    if delivery.driver_id != Some(driver_id) {
        return Err(CoreError::Forbidden(
            "Only the assigned driver can complete this delivery".to_string(),
        ));
    }
    if delivery.status != deliveries::Status::InTransit {
        return Err(CoreError::IllegalState(
            "Delivery is not in transit".to_string(),
        ));
    }

    if let Some(contract_id) = delivery.contract_id {
        if let Some(contract) = contract_db::lock_contract(&txn, contract_id).await? {
            contract_db::update_contract_status(&txn, contract, contracts::Status::Completed)
                .await?;
        }
    }
    let delivery =
        delivery_db::update_delivery_status(&txn, delivery, deliveries::Status::Delivered).await?;
    txn.commit().await?;

    info!(delivery_id = %delivery.id, "Delivery completed");
    Ok(delivery)
}

/// Cancel a project that has not been paid for.
pub async fn cancel_project(
    db: &DatabaseConnection,
    project_id: Uuid,
    farmer_id: Uuid,
) -> CoreResult<projects::Model> {
    let txn = db.begin().await?;

    let pending_invoice =
        invoice_db::lock_pending_invoice_for(&txn, Obligation::project(project_id)).await?;
    let project = project_db::lock_project(&txn, project_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Project", project_id))?;
    // A staffing commit may have issued the invoice while we waited on the project.
    let pending_invoice = match pending_invoice {
        Some(invoice) => Some(invoice),
        None => invoice_db::lock_pending_invoice_for(&txn, Obligation::project(project_id)).await?,
    };

    if project.farmer_id != farmer_id {
        return Err(CoreError::Forbidden(
            "Only the project owner can cancel it".to_string(),
        ));
    }
    if !project.status.is_cancellable() {
        return Err(CoreError::IllegalState(format!(
            "Project cannot be cancelled while {:?}",
            project.status
        )));
    }

    for contract in contract_db::lock_open_contracts_for_project(&txn, project.id).await? {
        contract_db::update_contract_status(&txn, contract, contracts::Status::Terminated).await?;
    }
    for assignment in project_db::list_staffed_assignments(&txn, project.id).await? {
        project_db::update_assignment_status(&txn, assignment, assignments::Status::Terminated)
            .await?;
    }
    for application in project_db::lock_pending_applications(&txn, project.id).await? {
        project_db::update_application_status(&txn, application, applications::Status::Rejected)
            .await?;
    }
    if let Some(invoice) = pending_invoice {
        settlement::fail_invoice(&txn, invoice).await?;
    }

    let project =
        project_db::update_project_status(&txn, project, projects::Status::Cancelled).await?;
    txn.commit().await?;

    info!(project_id = %project.id, "Project cancelled");
    Ok(project)
}

/// Cancel a delivery before its invoice is paid.
pub async fn cancel_delivery(
    db: &DatabaseConnection,
    delivery_id: Uuid,
    farmer_id: Uuid,
) -> CoreResult<deliveries::Model> {
    let txn = db.begin().await?;

    let obligation = Obligation::delivery(delivery_id);
    let pending_invoice = invoice_db::lock_pending_invoice_for(&txn, obligation).await?;
    let delivery = delivery_db::lock_delivery(&txn, delivery_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Delivery", delivery_id))?;
    let pending_invoice = match pending_invoice {
        Some(invoice) => Some(invoice),
        None => invoice_db::lock_pending_invoice_for(&txn, obligation).await?,
    };

    if delivery.farmer_id != farmer_id {
        return Err(CoreError::Forbidden(
            "Only the sender can cancel this delivery".to_string(),
        ));
    }
    if !matches!(
        delivery.status,
        deliveries::Status::PendingDriver | deliveries::Status::PendingSignature
    ) {
        return Err(CoreError::IllegalState(
            "Delivery can no longer be cancelled".to_string(),
        ));
    }
    if latest_invoice_is_paid(&txn, obligation).await? {
        return Err(CoreError::IllegalState(
            "Delivery has already been paid".to_string(),
        ));
    }

    if let Some(contract_id) = delivery.contract_id {
        if let Some(contract) = contract_db::lock_contract(&txn, contract_id).await? {
            if matches!(
                contract.status,
                contracts::Status::PendingSignature | contracts::Status::Active
            ) {
                contract_db::update_contract_status(&txn, contract, contracts::Status::Terminated)
                    .await?;
            }
        }
    }
    if let Some(invoice) = pending_invoice {
        settlement::fail_invoice(&txn, invoice).await?;
    }

    let delivery =
        delivery_db::update_delivery_status(&txn, delivery, deliveries::Status::Cancelled).await?;
    txn.commit().await?;

    info!(delivery_id = %delivery.id, "Delivery cancelled");
    Ok(delivery)
}
