pub mod contracts;
pub mod deliveries;
pub mod payments;
pub mod payouts;
pub mod products;
pub mod projects;

use actix_web::web;

use crate::gateway::PaymentGateway;

pub fn init_routes<G: PaymentGateway + 'static>(cfg: &mut web::ServiceConfig) {
    // ── Marketplace board and project lifecycle ──
    cfg.service(
        web::scope("/projects")
            .route("", web::post().to(projects::create_project))
            .route("/{id}/applications", web::post().to(projects::apply))
            .route("/{id}/cancel", web::post().to(projects::cancel_project)),
    );
    cfg.service(
        web::scope("/applications")
            .route("/{id}/accept", web::post().to(projects::accept_application))
            .route("/{id}/reject", web::post().to(projects::reject_application))
            .route("/{id}/withdraw", web::post().to(projects::withdraw_application)),
    );
    cfg.service(web::resource("/direct-offers").route(web::post().to(projects::direct_offer)));
    cfg.service(
        web::resource("/assignments/{id}/complete")
            .route(web::post().to(projects::complete_assignment)),
    );

    // ── Deliveries ──
    cfg.service(
        web::scope("/deliveries")
            .route("", web::post().to(deliveries::create_delivery))
            .route("/{id}/driver", web::post().to(deliveries::choose_driver))
            .route("/{id}/start", web::post().to(deliveries::start_delivery))
            .route("/{id}/delivered", web::post().to(deliveries::mark_delivered))
            .route("/{id}/cancel", web::post().to(deliveries::cancel_delivery)),
    );

    // ── Contracts ──
    cfg.service(
        web::scope("/contracts")
            .route("", web::get().to(contracts::get_contracts))
            .route("/{id}", web::get().to(contracts::get_contract))
            .route("/{id}/sign", web::post().to(contracts::sign_contract)),
    );

    // ── Invoices and payments ──
    cfg.service(
        web::resource("/invoices/{id}/reissue").route(web::post().to(payments::reissue_invoice)),
    );
    // The webhook is registered before `/payments/{id}` routes and carries no auth.
    cfg.service(
        web::scope("/payments")
            .route("/webhook", web::post().to(payments::webhook::<G>))
            .route("/{id}/initiate", web::post().to(payments::initiate::<G>)),
    );
    cfg.service(web::resource("/checkout").route(web::post().to(payments::checkout::<G>)));

    // ── Payout ledger (admin) ──
    cfg.service(
        web::scope("/admin/payouts")
            .route("", web::get().to(payouts::get_pending_payouts))
            .route("/{id}/complete", web::post().to(payouts::complete_payout))
            .route("/{id}/fail", web::post().to(payouts::fail_payout)),
    );

    // ── Inventory ──
    cfg.service(web::resource("/products/{id}/stock").route(web::put().to(products::update_stock)));
}
