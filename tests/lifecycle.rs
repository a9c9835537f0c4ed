//! Lending engine scenarios against the in-memory store

use std::sync::Arc;

use biblio_server::{
    config::LoanPolicyConfig,
    models::{
        book::CreateBook,
        fine::FineFilter,
        loan::{CreateLoan, UpdateLoan},
        reservation::CreateReservation,
        Caller,
    },
    repository::{LibraryStore, MemoryStore},
    services::{notifications::LogNotifier, Services},
    AppError,
};
use chrono::Duration;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

struct Library {
    store: Arc<MemoryStore>,
    services: Services,
    admin: Caller,
}

impl Library {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let services = Services::with_notifier(
            store.clone(),
            LoanPolicyConfig::default(),
            Arc::new(LogNotifier),
        );
        Self {
            store,
            services,
            admin: Caller::admin("librarian@example.org"),
        }
    }

    async fn book(&self, copies: i32) -> i32 {
        let book = self
            .services
            .catalog
            .create_book(
                &self.admin,
                CreateBook {
                    title: format!("Book with {} copies", copies),
                    author: "Jules Verne".into(),
                    isbn: "978-2253006329".into(),
                    publication_year: 1870,
                    category_id: None,
                    available_copies: copies,
                    image_url: None,
                },
            )
            .await
            .unwrap();
        book.id
    }

    async fn stock(&self, book_id: i32) -> i32 {
        self.store.get_book(book_id).await.unwrap().unwrap().available_copies
    }

    async fn borrow(&self, who: &Caller, book_id: i32) -> Result<biblio_server::models::Loan, AppError> {
        self.services
            .loans
            .create_loan(
                who,
                CreateLoan {
                    book_id,
                    member_id: None,
                    due_date: None,
                },
            )
            .await
    }

    async fn reserve(&self, who: &Caller, book_id: i32) -> biblio_server::models::Reservation {
        self.services
            .reservations
            .create(who, CreateReservation { book_id, member_id: None })
            .await
            .unwrap()
    }

    /// Return through the admin edit path at `days` past the due date
    async fn return_late(&self, loan: &biblio_server::models::Loan, days: i64) -> biblio_server::models::Loan {
        self.services
            .loans
            .update_loan(
                &self.admin,
                loan.id,
                UpdateLoan {
                    loan_date: None,
                    due_date: None,
                    returned_at: Some(loan.due_date + Duration::days(days)),
                    version: loan.version,
                },
            )
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_capacity_is_three_active_loans() {
    let library = Library::new();
    let reader = Caller::member("reader@example.org");

    let mut loans = Vec::new();
    for _ in 0..3 {
        let book_id = library.book(1).await;
        loans.push(assert_ok!(library.borrow(&reader, book_id).await));
    }

    let fourth = library.book(1).await;
    let err = assert_err!(library.borrow(&reader, fourth).await);
    assert!(matches!(err, AppError::CapacityExceeded { limit: 3 }));
    assert_eq!(library.stock(fourth).await, 1);

    // a return frees a slot
    library.services.loans.return_loan(&reader, loans[0].id).await.unwrap();
    assert_ok!(library.borrow(&reader, fourth).await);
}

#[tokio::test]
async fn test_stock_bookkeeping() {
    let library = Library::new();
    let book_id = library.book(2).await;
    let a = Caller::member("a@example.org");
    let b = Caller::member("b@example.org");

    let loan_a = library.borrow(&a, book_id).await.unwrap();
    library.borrow(&b, book_id).await.unwrap();
    assert_eq!(library.stock(book_id).await, 0);

    library.services.loans.return_loan(&a, loan_a.id).await.unwrap();
    assert_eq!(library.stock(book_id).await, 1);
}

#[tokio::test]
async fn test_reservation_fifo() {
    let library = Library::new();
    let book_id = library.book(0).await;
    let first = Caller::member("first@example.org");
    let second = Caller::member("second@example.org");

    let r1 = library.reserve(&first, book_id).await;
    let r2 = library.reserve(&second, book_id).await;

    let err = assert_err!(library.borrow(&second, book_id).await);
    assert!(matches!(err, AppError::ReservedByOther));

    assert_ok!(library.borrow(&first, book_id).await);
    assert_eq!(library.stock(book_id).await, 0);

    let queue = library.services.reservations.queue(&library.admin, book_id).await.unwrap();
    assert_eq!(queue.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r2.id]);
    assert!(!queue.iter().any(|r| r.id == r1.id));

    // now the second member is at the head
    assert_ok!(library.borrow(&second, book_id).await);
    assert!(library
        .services
        .reservations
        .queue(&library.admin, book_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_fine_for_seven_days_late() {
    let library = Library::new();
    let book_id = library.book(1).await;
    let reader = Caller::member("slow@example.org");

    let loan = library.borrow(&reader, book_id).await.unwrap();
    library.return_late(&loan, 7).await;

    let fines = library.services.fines.list(&reader, FineFilter::default()).await.unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].amount, Decimal::new(35, 0));
    assert_eq!(fines[0].loan_id, loan.id);
}

#[tokio::test]
async fn test_no_fine_on_due_date() {
    let library = Library::new();
    let book_id = library.book(1).await;
    let reader = Caller::member("punctual@example.org");

    let loan = library.borrow(&reader, book_id).await.unwrap();
    library.return_late(&loan, 0).await;

    let fines = library.services.fines.list(&reader, FineFilter::default()).await.unwrap();
    assert!(fines.is_empty());
}

#[tokio::test]
async fn test_payment_is_recorded_once() {
    let library = Library::new();
    let book_id = library.book(1).await;
    let reader = Caller::member("debtor@example.org");

    let loan = library.borrow(&reader, book_id).await.unwrap();
    library.return_late(&loan, 2).await;
    let fine = library
        .services
        .fines
        .unpaid_fines(&library.admin)
        .await
        .unwrap()
        .remove(0);

    let paid = library.services.fines.mark_paid(&library.admin, fine.id).await.unwrap();
    assert!(paid.paid);
    assert!(paid.paid_at.is_some());

    let err = assert_err!(library.services.fines.mark_paid(&library.admin, fine.id).await);
    assert!(matches!(err, AppError::AlreadyPaid(id) if id == fine.id));

    let reloaded = library.services.fines.get(&library.admin, fine.id).await.unwrap();
    assert_eq!(reloaded.amount, fine.amount);
    assert_eq!(reloaded.created_at, fine.created_at);
    assert_eq!(reloaded.paid_at, paid.paid_at);
    assert!(library.services.fines.unpaid_fines(&library.admin).await.unwrap().is_empty());

    let err = assert_err!(library.services.fines.mark_paid(&library.admin, 9999).await);
    assert!(matches!(err, AppError::FineNotFound(9999)));
}

#[tokio::test]
async fn test_members_cannot_pay_fines() {
    let library = Library::new();
    let err = assert_err!(
        library
            .services
            .fines
            .mark_paid(&Caller::member("cheeky@example.org"), 1)
            .await
    );
    assert!(matches!(err, AppError::NotAuthorized(_)));
}

#[tokio::test]
async fn test_member_auto_provision() {
    let library = Library::new();
    let a = library.services.members.get_or_create_by_email("unseen@example.org").await.unwrap();
    let b = library.services.members.get_or_create_by_email("unseen@example.org").await.unwrap();
    assert_eq!(a.id, b.id);

    let matching = library
        .services
        .members
        .search(
            &library.admin,
            &biblio_server::models::member::MemberQuery {
                search: Some("unseen@example.org".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(matching.len(), 1);
}

#[tokio::test]
async fn test_end_to_end_return_bypasses_queue_while_in_stock() {
    let library = Library::new();
    let book_id = library.book(1).await;
    let m1 = Caller::member("m1@example.org");
    let m2 = Caller::member("m2@example.org");

    let loan = library.borrow(&m1, book_id).await.unwrap();
    assert_eq!(library.stock(book_id).await, 0);

    let reservation = library.reserve(&m2, book_id).await;

    library.return_late(&loan, 3).await;
    assert_eq!(library.stock(book_id).await, 1);

    let fines = library.services.fines.list(&m1, FineFilter::default()).await.unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].amount, Decimal::new(15, 0));
    assert!(!fines[0].paid);

    // stock is 1, so the queue is not consulted and the reservation stays
    assert_ok!(library.borrow(&m2, book_id).await);
    assert_eq!(library.stock(book_id).await, 0);
    let mine = library.services.reservations.own(&m2).await.unwrap();
    assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![reservation.id]);
}

#[tokio::test]
async fn test_concurrent_last_copy() {
    let library = Arc::new(Library::new());
    let book_id = library.book(1).await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let library = library.clone();
            tokio::spawn(async move {
                let who = Caller::member(format!("racer{}@example.org", i));
                library.borrow(&who, book_id).await
            })
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(AppError::OutOfStockNoReservation) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(library.stock(book_id).await, 0);
}

#[tokio::test]
async fn test_concurrent_requests_respect_capacity() {
    let library = Arc::new(Library::new());
    let reader = Caller::member("greedy@example.org");
    for _ in 0..2 {
        let book_id = library.book(1).await;
        library.borrow(&reader, book_id).await.unwrap();
    }

    let mut books = Vec::new();
    for _ in 0..5 {
        books.push(library.book(1).await);
    }

    let handles: Vec<_> = books
        .into_iter()
        .map(|book_id| {
            let library = library.clone();
            let reader = reader.clone();
            tokio::spawn(async move { library.borrow(&reader, book_id).await })
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            won += 1;
        }
    }
    assert_eq!(won, 1);

    let active = library
        .services
        .loans
        .list_loans(
            &reader,
            biblio_server::models::loan::LoanFilter {
                active_only: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 3);
}

#[tokio::test]
async fn test_concurrent_return_edits_fire_once() {
    let library = Arc::new(Library::new());
    let book_id = library.book(1).await;
    let reader = Caller::member("double@example.org");
    let loan = library.borrow(&reader, book_id).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let library = library.clone();
            let loan = loan.clone();
            tokio::spawn(async move {
                library
                    .services
                    .loans
                    .update_loan(
                        &library.admin,
                        loan.id,
                        UpdateLoan {
                            loan_date: None,
                            due_date: None,
                            returned_at: Some(loan.due_date + Duration::days(4)),
                            version: loan.version,
                        },
                    )
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(AppError::ConcurrencyConflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(library.stock(book_id).await, 1);
    let fines = library.services.fines.unpaid_fines(&library.admin).await.unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].amount, Decimal::new(20, 0));
}

#[tokio::test]
async fn test_deleting_member_returns_their_copies() {
    let library = Library::new();
    let lent = library.book(1).await;
    let returned = library.book(1).await;
    let reader = Caller::member("leaving@example.org");

    library.borrow(&reader, lent).await.unwrap();
    let done = library.borrow(&reader, returned).await.unwrap();
    library.services.loans.return_loan(&reader, done.id).await.unwrap();
    assert_eq!(library.stock(lent).await, 0);
    assert_eq!(library.stock(returned).await, 1);

    let member = library.services.members.resolve(&reader).await.unwrap();
    library.services.members.delete(&library.admin, member.id).await.unwrap();

    assert_eq!(library.stock(lent).await, 1);
    assert_eq!(library.stock(returned).await, 1);
    let loans = library
        .services
        .loans
        .list_loans(&library.admin, biblio_server::models::loan::LoanFilter::default())
        .await
        .unwrap();
    assert!(loans.is_empty());

    let err = assert_err!(library.services.members.delete(&library.admin, member.id).await);
    assert!(matches!(err, AppError::NotFound(_)));
}
