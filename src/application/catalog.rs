use crate::application::accounts::resolve_account;
use crate::domain::account::{AccountIdentity, ROLE_SUPER_ADMIN};
use crate::domain::course::{CourseDraft, CourseView};
use crate::domain::ports::{AccountStoreRef, CourseStoreRef};
use crate::error::{BillingError, Result};

/// Read access to the course catalog, plus administration for super admins.
///
/// Catalog writes are last-writer-wins and never touch the ledger.
#[derive(Clone)]
pub struct CourseCatalog {
    courses: CourseStoreRef,
    accounts: AccountStoreRef,
}

impl CourseCatalog {
    pub fn new(courses: CourseStoreRef, accounts: AccountStoreRef) -> Self {
        Self { courses, accounts }
    }

    pub async fn list_courses(&self) -> Result<Vec<CourseView>> {
        let courses = self.courses.get_all().await?;
        Ok(courses.iter().map(CourseView::from).collect())
    }

    pub async fn course(&self, code: &str) -> Result<CourseView> {
        self.courses
            .find_by_code(code)
            .await?
            .map(|course| CourseView::from(&course))
            .ok_or_else(|| BillingError::CourseNotFound(code.to_string()))
    }

    pub async fn create_course(
        &self,
        identity: Option<&AccountIdentity>,
        draft: CourseDraft,
    ) -> Result<CourseView> {
        self.authorize(identity).await?;
        draft.validate()?;
        let course = self.courses.insert(draft).await?;
        tracing::info!(course_id = course.id, code = %course.code, "course created");
        Ok(CourseView::from(&course))
    }

    /// Rewrites the course currently known as `code`. The course keeps its
    /// id, so its ledger history follows it under the new code.
    pub async fn update_course(
        &self,
        identity: Option<&AccountIdentity>,
        code: &str,
        draft: CourseDraft,
    ) -> Result<CourseView> {
        self.authorize(identity).await?;
        let existing = self
            .courses
            .find_by_code(code)
            .await?
            .ok_or_else(|| BillingError::CourseNotFound(code.to_string()))?;
        draft.validate()?;

        let course = draft.into_course(existing.id);
        self.courses.update(course.clone()).await?;
        tracing::info!(course_id = course.id, from = %code, to = %course.code, "course updated");
        Ok(CourseView::from(&course))
    }

    async fn authorize(&self, identity: Option<&AccountIdentity>) -> Result<()> {
        let account = resolve_account(&self.accounts, identity).await?;
        if account.has_role(ROLE_SUPER_ADMIN) {
            Ok(())
        } else {
            Err(BillingError::Forbidden)
        }
    }
}
