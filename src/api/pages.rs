//! Lazy offset pagination over get-documents.

use std::collections::VecDeque;
use std::thread;

use log::debug;

use super::client::{ApiError, NotesApi};
use crate::models::Document;

pub const PAGE_SIZE: usize = 100;

/// Iterator over every document the account can see, fetched a page at a time.
///
/// Stops after the first short page. An error is yielded once and ends the
/// iteration.
pub struct DocumentPages<'a, A: NotesApi + ?Sized> {
    api: &'a A,
    page_size: usize,
    offset: usize,
    pages_fetched: usize,
    buffer: VecDeque<Document>,
    exhausted: bool,
}

impl<'a, A: NotesApi + ?Sized> DocumentPages<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self::with_page_size(api, PAGE_SIZE)
    }

    pub fn with_page_size(api: &'a A, page_size: usize) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
            offset: 0,
            pages_fetched: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl<A: NotesApi + ?Sized> Iterator for DocumentPages<'_, A> {
    type Item = Result<Document, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                return Some(Ok(doc));
            }
            if self.exhausted {
                return None;
            }

            if self.pages_fetched > 0 {
                thread::sleep(self.api.page_delay());
            }

            match self.api.documents_page(self.page_size, self.offset) {
                Ok(page) => {
                    self.pages_fetched += 1;
                    debug!(
                        "page {} at offset {}: {} documents",
                        self.pages_fetched,
                        self.offset,
                        page.len()
                    );
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    self.offset += page.len();
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
