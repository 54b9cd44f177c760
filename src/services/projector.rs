//! Clinic-role projector service.
//!
//! The store-backed wrapper around the pure projection in
//! [`crate::domain::projection`]. Every entry point that issues or refreshes
//! a session goes through here; nothing else derives roles from the store.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::ClinicRoleMap;
use crate::errors::AppResult;
use crate::infra::UnitOfWork;

/// Projector trait for dependency injection.
#[async_trait]
pub trait ClinicRoleProjector: Send + Sync {
    /// Project all of a user's associations into a per-clinic role map.
    ///
    /// Fails with `NoClinicAssociation` when the user has no rows — login
    /// and token refresh both reject rather than issue a roleless session.
    async fn project(&self, user_id: Uuid) -> AppResult<ClinicRoleMap>;

    /// The reserved System clinic, excluded when picking a default clinic.
    fn system_clinic_id(&self) -> Uuid;
}

/// Concrete projector reading association rows through the Unit of Work.
pub struct Projector<U: UnitOfWork> {
    uow: Arc<U>,
    system_clinic_id: Uuid,
}

impl<U: UnitOfWork> Projector<U> {
    pub fn new(uow: Arc<U>, system_clinic_id: Uuid) -> Self {
        Self {
            uow,
            system_clinic_id,
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> ClinicRoleProjector for Projector<U> {
    async fn project(&self, user_id: Uuid) -> AppResult<ClinicRoleMap> {
        let rows = self.uow.clinic_roles().find_by_user(user_id).await?;
        ClinicRoleMap::project(rows)
    }

    fn system_clinic_id(&self) -> Uuid {
        self.system_clinic_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::predicate::eq;
    use std::collections::BTreeSet;

    use crate::domain::{AssociationRow, RoleName};
    use crate::errors::AppError;
    use crate::infra::repositories::MockClinicRoleRepository;
    use crate::infra::{
        ClinicRepository, ClinicRoleRepository, InviteRepository, PatientRepository,
        PlanRepository, SubscriptionRepository, TransactionContext, UserRepository,
    };

    struct TestUnitOfWork {
        clinic_roles: Arc<MockClinicRoleRepository>,
    }

    #[async_trait]
    impl UnitOfWork for TestUnitOfWork {
        fn users(&self) -> Arc<dyn UserRepository> {
            unimplemented!()
        }

        fn clinics(&self) -> Arc<dyn ClinicRepository> {
            unimplemented!()
        }

        fn clinic_roles(&self) -> Arc<dyn ClinicRoleRepository> {
            self.clinic_roles.clone()
        }

        fn invites(&self) -> Arc<dyn InviteRepository> {
            unimplemented!()
        }

        fn subscriptions(&self) -> Arc<dyn SubscriptionRepository> {
            unimplemented!()
        }

        fn plans(&self) -> Arc<dyn PlanRepository> {
            unimplemented!()
        }

        fn patients(&self) -> Arc<dyn PatientRepository> {
            unimplemented!()
        }

        async fn transaction<F, T>(&self, _f: F) -> AppResult<T>
        where
            F: for<'a> FnOnce(
                    TransactionContext<'a>,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
                > + Send,
            T: Send,
        {
            Err(AppError::internal("Transactions not supported in test mock"))
        }

        async fn transaction_serializable<F, T>(&self, _f: F) -> AppResult<T>
        where
            F: for<'a> FnOnce(
                    TransactionContext<'a>,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>,
                > + Send,
            T: Send,
        {
            Err(AppError::internal("Transactions not supported in test mock"))
        }
    }

    fn projector_with_rows(rows: Vec<AssociationRow>, user_id: Uuid) -> Projector<TestUnitOfWork> {
        let mut repo = MockClinicRoleRepository::new();
        repo.expect_find_by_user()
            .with(eq(user_id))
            .returning(move |_| Ok(rows.clone()));

        Projector::new(
            Arc::new(TestUnitOfWork {
                clinic_roles: Arc::new(repo),
            }),
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn projects_store_rows_into_role_sets() {
        let user_id = Uuid::new_v4();
        let clinic = Uuid::new_v4();
        let projector = projector_with_rows(
            vec![
                AssociationRow {
                    clinic_id: clinic,
                    clinic_name: "Alpha".to_string(),
                    role: RoleName::Doctor,
                },
                AssociationRow {
                    clinic_id: clinic,
                    clinic_name: "Alpha".to_string(),
                    role: RoleName::Admin,
                },
            ],
            user_id,
        );

        let map = projector.project(user_id).await.unwrap();
        assert_eq!(
            map.get(clinic).unwrap().roles,
            BTreeSet::from([RoleName::Doctor, RoleName::Admin])
        );
    }

    #[tokio::test]
    async fn zero_rows_is_a_hard_error() {
        let user_id = Uuid::new_v4();
        let projector = projector_with_rows(vec![], user_id);

        let err = projector.project(user_id).await.unwrap_err();
        assert!(matches!(err, AppError::NoClinicAssociation));
    }
}
