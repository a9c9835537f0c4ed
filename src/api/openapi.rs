//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, categories, dashboard, fines, health, loans, members, reservations};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblio API",
        version = "1.0.0",
        description = "Library lending REST API: catalog, members, loans, reservations and fines",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::available_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Members
        members::list_members,
        members::me,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        members::member_loans,
        members::member_fines,
        // Loans
        loans::list_loans,
        loans::late_loans,
        loans::get_loan,
        loans::create_loan,
        loans::return_loan,
        loans::update_loan,
        loans::delete_loan,
        // Reservations
        reservations::list_reservations,
        reservations::my_reservations,
        reservations::get_reservation,
        reservations::create_reservation,
        reservations::cancel_reservation,
        reservations::book_queue,
        // Fines
        fines::list_fines,
        fines::unpaid_fines,
        fines::get_fine,
        fines::create_fine,
        fines::pay_fine,
        fines::delete_fine,
        // Dashboard
        dashboard::admin_dashboard,
        dashboard::member_dashboard,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::Category,
            crate::models::book::CreateCategory,
            crate::models::book::UpdateCategory,
            // Members
            crate::models::member::Member,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            // Loans
            crate::models::loan::CreateLoan,
            crate::models::loan::UpdateLoan,
            crate::models::loan::LoanResponse,
            // Reservations
            crate::models::reservation::Reservation,
            crate::models::reservation::CreateReservation,
            // Fines
            crate::models::fine::Fine,
            crate::models::fine::CreateFine,
            // Dashboard
            crate::models::dashboard::LibraryStats,
            crate::models::dashboard::AuthorCount,
            crate::models::dashboard::MonthCount,
            crate::models::dashboard::MemberDashboard,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "categories", description = "Book categories"),
        (name = "members", description = "Member management"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "reservations", description = "Reservation queue"),
        (name = "fines", description = "Late-return fines"),
        (name = "dashboard", description = "Dashboards")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
