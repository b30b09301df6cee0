use crate::error::BillingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type CourseId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    Free,
    Rent,
    Buy,
}

impl CourseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseType::Free => "free",
            CourseType::Rent => "rent",
            CourseType::Buy => "buy",
        }
    }

    /// Whether a course of this type carries a price.
    pub fn is_paid(&self) -> bool {
        !matches!(self, CourseType::Free)
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(CourseType::Free),
            "rent" => Ok(CourseType::Rent),
            "buy" => Ok(CourseType::Buy),
            other => Err(BillingError::ValidationError(format!(
                "Unknown course type: {other}"
            ))),
        }
    }
}

/// A catalog entry.
///
/// `price` is `None` for free courses; for paid ones it is always present and
/// non-negative once the course went through [`CourseDraft::validate`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub course_type: CourseType,
    pub price: Option<Decimal>,
}

impl Course {
    /// Applies the draft rules to a course about to be stored.
    pub fn validate(&self) -> Result<(), BillingError> {
        CourseDraft {
            code: self.code.clone(),
            name: self.name.clone(),
            course_type: self.course_type,
            price: self.price,
        }
        .validate()
    }

    /// The amount a purchase of this course costs. A paid course stored
    /// without a price cannot be sold.
    pub fn charge(&self) -> Result<Decimal, BillingError> {
        match (self.course_type, self.price) {
            (CourseType::Free, _) => Ok(Decimal::ZERO),
            (_, Some(price)) if price >= Decimal::ZERO => Ok(price),
            (_, Some(_)) => Err(BillingError::ValidationError(format!(
                "Course {} has a negative price",
                self.code
            ))),
            (_, None) => Err(BillingError::ValidationError(format!(
                "Course {} has no price",
                self.code
            ))),
        }
    }
}

/// Course fields as submitted for creation or edition.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CourseDraft {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: CourseType,
    pub price: Option<Decimal>,
}

impl CourseDraft {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.code.trim().is_empty() {
            return Err(BillingError::ValidationError(
                "Course code must not be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(BillingError::ValidationError(
                "Course name must not be empty".to_string(),
            ));
        }
        if self.course_type.is_paid() {
            match self.price {
                None => {
                    return Err(BillingError::ValidationError(format!(
                        "Price is required for {} courses",
                        self.course_type
                    )));
                }
                Some(price) if price < Decimal::ZERO => {
                    return Err(BillingError::ValidationError(
                        "Price must not be negative".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Builds the stored course, dropping any price sent for a free course.
    pub fn into_course(self, id: CourseId) -> Course {
        let price = if self.course_type.is_paid() {
            self.price
        } else {
            None
        };
        Course {
            id,
            code: self.code,
            name: self.name,
            course_type: self.course_type,
            price,
        }
    }
}

/// Public projection of a course.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct CourseView {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: CourseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            code: course.code.clone(),
            name: course.name.clone(),
            course_type: course.course_type,
            price: course.price.filter(|_| course.course_type.is_paid()),
        }
    }
}
