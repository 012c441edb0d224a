//! Contract Engine: work and delivery contracts, from creation to signature.

use std::collections::HashMap;

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    contracts as contract_db, deliveries as delivery_db, projects as project_db,
    users as user_db,
};
use crate::error::{CoreError, CoreResult};
use crate::models::contracts::{self, ContractDetails, ContractType};
use crate::models::project_applications as applications;
use crate::models::project_assignments as assignments;
use crate::models::projects::{self, CreateProject, DirectOffer};
use crate::models::users::{self, Roles};
use crate::models::{deliveries, invoices};
use crate::services::board;
use crate::services::invoices::InvoiceEngine;

pub const WORKER_BUSY: &str = "worker is currently busy";

/// Result of a farmer accepting an application.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedApplication {
    pub application: applications::Model,
    pub contract: contracts::Model,
    pub assignment: assignments::Model,
    /// Present when this acceptance fully staffed the project.
    pub invoice: Option<invoices::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectOfferCreated {
    pub project: projects::Model,
    pub contract: contracts::Model,
    pub assignment: assignments::Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryContractCreated {
    pub delivery: deliveries::Model,
    pub contract: contracts::Model,
    pub invoice: invoices::Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedContract {
    pub contract: contracts::Model,
    /// Issued when the signature accepts a direct offer.
    pub invoice: Option<invoices::Model>,
}

#[derive(Debug, Clone)]
pub struct ContractEngine {
    invoices: InvoiceEngine,
}

impl ContractEngine {
    pub fn new(invoices: InvoiceEngine) -> Self {
        Self { invoices }
    }

    /// Lock the worker row and enforce the single-active-work rule.
    async fn ensure_worker_available<C: ConnectionTrait>(
        conn: &C,
        worker_id: Uuid,
    ) -> CoreResult<users::Model> {
        let worker = user_db::lock_user(conn, worker_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Worker", worker_id))?;
        if worker.role != Roles::Worker {
            return Err(CoreError::InvalidInput(format!(
                "User {worker_id} is not a worker"
            )));
        }

        if project_db::count_active_assignments_for_worker(conn, worker_id).await? > 0 {
            return Err(CoreError::Conflict(WORKER_BUSY.to_string()));
        }
        Ok(worker)
    }

    /// CreateWorkContract: contract plus assignment for an available worker.
    async fn create_work_contract<C: ConnectionTrait>(
        conn: &C,
        project: &projects::Model,
        worker_id: Uuid,
    ) -> CoreResult<(contracts::Model, assignments::Model)> {
        Self::ensure_worker_available(conn, worker_id).await?;

        let contract =
            contract_db::insert_work_contract(conn, project.id, project.farmer_id, worker_id)
                .await?;
        let assignment = project_db::insert_assignment(
            conn,
            project.id,
            worker_id,
            contract.id,
            project.payment_rate,
        )
        .await?;

        Ok((contract, assignment))
    }

    /// Accept a pending application. Contract, assignment, application status
    /// and (when fully staffed) the invoice are written in one transaction.
    pub async fn accept_application(
        &self,
        db: &DatabaseConnection,
        application_id: Uuid,
        farmer_id: Uuid,
    ) -> CoreResult<AcceptedApplication> {
        let txn = db.begin().await?;

        // Project before application, like every other project-scoped write.
        let peek = project_db::get_application_by_id(&txn, application_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Application", application_id))?;
        let project = project_db::lock_project(&txn, peek.project_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Project", peek.project_id))?;
        let application = project_db::lock_application(&txn, application_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Application", application_id))?;

        if project.farmer_id != farmer_id {
            return Err(CoreError::Forbidden(
                "Only the project owner can accept applications".to_string(),
            ));
        }
        if application.status != applications::Status::Pending {
            return Err(CoreError::IllegalState(
                "Application is no longer pending".to_string(),
            ));
        }
        if project.status != projects::Status::Open {
            return Err(CoreError::IllegalState(
                "Project is not open for hiring".to_string(),
            ));
        }
        let staffed = project_db::count_staffed_assignments(&txn, project.id).await?;
        if staffed >= project.workers_needed as u64 {
            return Err(CoreError::IllegalState(
                "Project is already fully staffed".to_string(),
            ));
        }

        let (contract, assignment) =
            Self::create_work_contract(&txn, &project, application.worker_id).await?;
        let application = project_db::update_application_status(
            &txn,
            application,
            applications::Status::Accepted,
        )
        .await?;
        let invoice = self
            .invoices
            .issue_for_project_if_staffed(&txn, project)
            .await?
            .map(|(invoice, _)| invoice);

        txn.commit().await?;

        info!(
            contract_id = %contract.id,
            project_id = %assignment.project_id,
            worker_id = %assignment.worker_id,
            "Application accepted"
        );
        Ok(AcceptedApplication {
            application,
            contract,
            assignment,
            invoice,
        })
    }

    /// Project, contract and assignment for one specific worker, atomically.
    /// The invoice follows once the worker signs.
    pub async fn create_direct_offer(
        &self,
        db: &DatabaseConnection,
        farmer_id: Uuid,
        offer: DirectOffer,
    ) -> CoreResult<DirectOfferCreated> {
        if offer.worker_id == farmer_id {
            return Err(CoreError::InvalidInput(
                "You cannot send an offer to yourself".to_string(),
            ));
        }
        board::validate_terms(1, offer.start_date, offer.end_date, offer.payment_rate)?;

        let txn = db.begin().await?;

        Self::ensure_worker_available(&txn, offer.worker_id).await?;

        let worker_id = offer.worker_id;
        let project = project_db::insert_project(
            &txn,
            farmer_id,
            CreateProject {
                title: offer.title,
                description: offer.description,
                location: offer.location,
                workers_needed: 1,
                start_date: offer.start_date,
                end_date: offer.end_date,
                payment_type: offer.payment_type,
                payment_rate: offer.payment_rate,
            },
            projects::Status::DirectOffer,
        )
        .await?;
        let contract =
            contract_db::insert_work_contract(&txn, project.id, farmer_id, worker_id).await?;
        let assignment = project_db::insert_assignment(
            &txn,
            project.id,
            worker_id,
            contract.id,
            project.payment_rate,
        )
        .await?;

        txn.commit().await?;

        info!(
            project_id = %project.id,
            contract_id = %contract.id,
            worker_id = %worker_id,
            "Direct offer sent"
        );
        Ok(DirectOfferCreated {
            project,
            contract,
            assignment,
        })
    }

    /// Hire a driver for a delivery; the delivery invoice is issued in the same
    /// transaction.
    pub async fn create_delivery_contract(
        &self,
        db: &DatabaseConnection,
        delivery_id: Uuid,
        farmer_id: Uuid,
        driver_id: Uuid,
    ) -> CoreResult<DeliveryContractCreated> {
        let txn = db.begin().await?;

        let delivery = delivery_db::lock_delivery(&txn, delivery_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Delivery", delivery_id))?;

        if delivery.farmer_id != farmer_id {
            return Err(CoreError::Forbidden(
                "Only the sender can choose a driver".to_string(),
            ));
        }
        if delivery.status != deliveries::Status::PendingDriver {
            return Err(CoreError::IllegalState(
                "Delivery already has a driver".to_string(),
            ));
        }

        let driver = user_db::get_user_by_id(&txn, driver_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", driver_id))?;
        if driver.role != Roles::Driver {
            return Err(CoreError::InvalidInput(format!(
                "User {driver_id} is not a driver"
            )));
        }

        let contract =
            contract_db::insert_delivery_contract(&txn, delivery.id, farmer_id, driver_id).await?;
        let delivery = delivery_db::assign_driver(&txn, delivery, driver_id, contract.id).await?;
        let invoice = self.invoices.issue_for_delivery(&txn, &delivery).await?;

        txn.commit().await?;

        info!(
            delivery_id = %delivery.id,
            contract_id = %contract.id,
            driver_id = %driver_id,
            "Driver selected for delivery"
        );
        Ok(DeliveryContractCreated {
            delivery,
            contract,
            invoice,
        })
    }

    /// Counter-signature by the worker or driver.
    pub async fn sign(
        &self,
        db: &DatabaseConnection,
        contract_id: Uuid,
        signer_id: Uuid,
    ) -> CoreResult<SignedContract> {
        let txn = db.begin().await?;

        let peek = contract_db::get_contract_by_id(&txn, contract_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Contract", contract_id))?;
        let project = match peek.project_id {
            Some(project_id) => project_db::lock_project(&txn, project_id).await?,
            None => None,
        };
        if let Some(delivery_id) = peek.delivery_id {
            delivery_db::lock_delivery(&txn, delivery_id).await?;
        }
        let contract = contract_db::lock_contract(&txn, contract_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Contract", contract_id))?;

        if contract.second_party() != Some(signer_id) {
            return Err(CoreError::Forbidden(
                "Only the second party can sign this contract".to_string(),
            ));
        }
        if contract.status != contracts::Status::PendingSignature {
            return Err(CoreError::IllegalState(
                "Contract is not awaiting signature".to_string(),
            ));
        }

        let contract = contract_db::mark_signed(&txn, contract).await?;

        // A direct offer becomes payable once the worker accepts it.
        let mut invoice = None;
        if let Some(project) = project {
            if project.status == projects::Status::DirectOffer {
                invoice = self
                    .invoices
                    .issue_for_project_if_staffed(&txn, project)
                    .await?
                    .map(|(invoice, _)| invoice);
            }
        }

        txn.commit().await?;

        info!(contract_id = %contract.id, signer_id = %signer_id, "Contract signed");
        Ok(SignedContract { contract, invoice })
    }

    /// A contract with party names, visible to its parties and to admins.
    pub async fn get_contract(
        &self,
        db: &DatabaseConnection,
        contract_id: Uuid,
        viewer: &users::Model,
    ) -> CoreResult<ContractDetails> {
        let contract = contract_db::get_contract_by_id(db, contract_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Contract", contract_id))?;

        if viewer.role != Roles::Admin && !contract.is_party(viewer.id) {
            return Err(CoreError::Forbidden(
                "You are not a party to this contract".to_string(),
            ));
        }

        let mut details = hydrate(db, vec![contract]).await?;
        details
            .pop()
            .ok_or_else(|| CoreError::not_found("Contract", contract_id))
    }

    pub async fn list_contracts(
        &self,
        db: &DatabaseConnection,
        user_id: Uuid,
    ) -> CoreResult<Vec<ContractDetails>> {
        let contracts = contract_db::get_contracts_for_party(db, user_id).await?;
        hydrate(db, contracts).await
    }
}

/// Attach party names and the project title or delivery description.
async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    contracts: Vec<contracts::Model>,
) -> CoreResult<Vec<ContractDetails>> {
    let user_ids = contracts
        .iter()
        .flat_map(|c| [Some(c.farmer_id), c.second_party()])
        .flatten();
    let users = user_db::get_users_by_ids(conn, user_ids).await?;

    let project_ids = contracts.iter().filter_map(|c| c.project_id).collect();
    let projects: HashMap<Uuid, projects::Model> = project_db::get_projects_by_ids(conn, project_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let delivery_ids = contracts.iter().filter_map(|c| c.delivery_id).collect();
    let deliveries: HashMap<Uuid, deliveries::Model> =
        delivery_db::get_deliveries_by_ids(conn, delivery_ids)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

    Ok(contracts
        .into_iter()
        .map(|contract| {
            let farmer_name = users
                .get(&contract.farmer_id)
                .map(|u| u.name.clone())
                .unwrap_or_default();
            let second_party_name = contract
                .second_party()
                .and_then(|id| users.get(&id))
                .map(|u| u.name.clone());
            let (project_title, delivery_description) = match contract.contract_type {
                ContractType::Work => (
                    contract
                        .project_id
                        .and_then(|id| projects.get(&id))
                        .map(|p| p.title.clone()),
                    None,
                ),
                ContractType::Delivery => (
                    None,
                    contract
                        .delivery_id
                        .and_then(|id| deliveries.get(&id))
                        .map(|d| d.item_description.clone()),
                ),
            };
            ContractDetails {
                contract,
                farmer_name,
                second_party_name,
                project_title,
                delivery_description,
            }
        })
        .collect())
}
