//! Page requests and page envelopes.

use crate::config::PersistenceConfig;
use crate::error::ValidationError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Zero-based page index plus an optional size.
///
/// Without a size the configured default applies; sizes above the
/// configured maximum are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub page: u32,
    pub size: Option<u32>,
}

impl PageRequest {
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            page,
            size: Some(size),
        }
    }

    /// Uses the configured default page size.
    pub fn page(page: u32) -> Self {
        Self { page, size: None }
    }

    pub(crate) fn resolve(&self, config: &PersistenceConfig) -> Result<PageSlice, ValidationError> {
        let size = match self.size {
            Some(0) => return Err(ValidationError::ZeroPageSize),
            Some(size) => size.min(config.max_page_size),
            None => config.default_page_size,
        };
        Ok(PageSlice {
            number: self.page,
            size,
        })
    }
}

/// A page request after size normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageSlice {
    pub number: u32,
    pub size: u32,
}

impl PageSlice {
    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }

    pub fn into_page<T>(self, content: Vec<T>, total_elements: u64) -> Page<T> {
        Page {
            content,
            number: self.number,
            size: self.size,
            total_elements,
        }
    }
}

/// One page of results together with the totals of the whole result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut [T] {
        &mut self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// `ceil(total_elements / size)`; zero for an empty result.
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.number) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Transforms the content, keeping paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Page", 10)?;
        state.serialize_field("content", &self.content)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("number_of_elements", &self.content.len())?;
        state.serialize_field("total_elements", &self.total_elements)?;
        state.serialize_field("total_pages", &self.total_pages())?;
        state.serialize_field("first", &self.is_first())?;
        state.serialize_field("last", &self.is_last())?;
        state.serialize_field("has_next", &self.has_next())?;
        state.serialize_field("has_previous", &self.has_previous())?;
        state.end()
    }
}
