//! In-memory store backing every repository trait
//!
//! All collections live behind one mutex, so each trait method is a single
//! atomic unit of work, matching the transactions of the PostgreSQL stores.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    BooksStore, BorrowFilter, BorrowsStore, FinesStore, ScansStore, SectionsStore, StudentsStore,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{format_book_code, NewBook},
        borrow::{CreditDebit, NewBorrowRequest, TransitionEffects},
        scan::NewScan,
        section::section_key,
        student::{NewStudent, UpdateStudent},
        Book, BookShort, BorrowRequest, BorrowRequestDetails, BorrowStatus, Fine, FineDetails,
        Scan, ScanDetails, Section, Student, StudentShort,
    },
};

#[derive(Default)]
struct MemoryState {
    // Insertion ordered; listings walk them backwards for newest first
    students: Vec<Student>,
    books: Vec<Book>,
    book_sequences: HashMap<String, i64>,
    borrows: Vec<BorrowRequest>,
    fines: Vec<Fine>,
    scans: Vec<Scan>,
    sections: Vec<Section>,
}

impl MemoryState {
    fn student(&self, id: Uuid) -> AppResult<&Student> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    fn student_mut(&mut self, id: Uuid) -> AppResult<&mut Student> {
        self.students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    fn book(&self, id: Uuid) -> AppResult<&Book> {
        self.books
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    fn borrow(&self, id: Uuid) -> AppResult<&BorrowRequest> {
        self.borrows
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound("Borrow request not found".to_string()))
    }

    fn borrow_mut(&mut self, id: Uuid) -> AppResult<&mut BorrowRequest> {
        self.borrows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound("Borrow request not found".to_string()))
    }

    fn fine_mut(&mut self, id: Uuid) -> AppResult<&mut Fine> {
        self.fines
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound("Fine not found".to_string()))
    }

    fn student_short(&self, id: Uuid) -> Option<StudentShort> {
        self.student(id).ok().map(StudentShort::from)
    }

    fn book_short(&self, id: Uuid) -> Option<BookShort> {
        self.book(id).ok().map(BookShort::from)
    }

    fn borrow_details(&self, request: &BorrowRequest) -> BorrowRequestDetails {
        BorrowRequestDetails {
            student: self.student_short(request.student_id),
            book: self.book_short(request.book_id),
            request: request.clone(),
        }
    }

    fn fine_details(&self, fine: &Fine) -> FineDetails {
        let link = self.borrow(fine.borrow_request_id).ok();
        FineDetails {
            student: link.and_then(|r| self.student_short(r.student_id)),
            book: link.and_then(|r| self.book_short(r.book_id)),
            fine: fine.clone(),
        }
    }

    fn check_student_unique(&self, skip: Option<Uuid>, student: &Student) -> AppResult<()> {
        for other in self.students.iter().filter(|s| Some(s.id) != skip) {
            if other.prn_number == student.prn_number {
                return Err(AppError::Conflict("PRN number already registered".to_string()));
            }
            if other.email == student.email {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            if other.rfid.hex == student.rfid.hex || other.rfid.decimal == student.rfid.decimal {
                return Err(AppError::Conflict("RFID already registered".to_string()));
            }
        }
        Ok(())
    }

    /// Validate then apply counter effects; nothing changes on error
    fn apply_effects(&mut self, request: &BorrowRequest, effects: TransitionEffects) -> AppResult<()> {
        if effects.copies_delta != 0 {
            let book = self.book(request.book_id)?;
            if book.available_copies + effects.copies_delta < 0 {
                return Err(AppError::BusinessRule(
                    "No copies of this book are available".to_string(),
                ));
            }
        }
        if effects.credit_refund_cap.is_some() {
            self.student(request.student_id)?;
        }

        let now = Utc::now();
        if effects.copies_delta != 0 {
            if let Some(book) = self.books.iter_mut().find(|b| b.id == request.book_id) {
                book.available_copies =
                    (book.available_copies + effects.copies_delta).min(book.total_copies);
                book.updated_at = now;
            }
        }
        if let Some(cap) = effects.credit_refund_cap {
            let student = self.student_mut(request.student_id)?;
            student.credits = (student.credits + 1).min(cap);
            student.version += 1;
            student.updated_at = now;
        }
        Ok(())
    }

    fn bump_section(&mut self, name: &str, visits: i64, bought: i64) -> Section {
        let key = section_key(name);
        let now = Utc::now();
        if let Some(section) = self.sections.iter_mut().find(|s| s.section_name == key) {
            section.visit_count += visits;
            section.books_bought_count += bought;
            section.updated_at = now;
            return section.clone();
        }
        let section = Section {
            section_name: key,
            visit_count: visits,
            books_bought_count: bought,
            shelf_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.sections.push(section.clone());
        section
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    fn state(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl StudentsStore for MemoryStore {
    async fn create(&self, student: NewStudent) -> AppResult<Student> {
        let mut state = self.state()?;
        let now = Utc::now();
        let created = Student {
            id: Uuid::new_v4(),
            prn_number: student.prn_number,
            name: student.name,
            class: student.class,
            section: student.section,
            roll_no: student.roll_no,
            gender: student.gender,
            contact_number: student.contact_number,
            email: student.email,
            photo: student.photo,
            rfid: student.rfid,
            is_active: true,
            credits: student.credits,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.check_student_unique(None, &created)?;
        state.students.push(created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Student> {
        self.state()?.student(id).cloned()
    }

    async fn find_by_prn(&self, prn: &str) -> AppResult<Option<Student>> {
        let prn = prn.trim().to_uppercase();
        Ok(self
            .state()?
            .students
            .iter()
            .find(|s| s.prn_number == prn)
            .cloned())
    }

    async fn find_by_rfid(&self, rfid: &str) -> AppResult<Option<Student>> {
        Ok(self
            .state()?
            .students
            .iter()
            .find(|s| s.rfid.hex == rfid || s.rfid.decimal == rfid)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Student>> {
        let state = self.state()?;
        Ok(page(state.students.iter().rev().cloned(), limit, offset))
    }

    async fn update(&self, id: Uuid, update: &UpdateStudent) -> AppResult<Student> {
        let mut state = self.state()?;
        let mut student = state.student(id)?.clone();

        if let Some(ref v) = update.name {
            student.name = v.clone();
        }
        if let Some(ref v) = update.class {
            student.class = v.clone();
        }
        if let Some(ref v) = update.section {
            student.section = v.clone();
        }
        if let Some(v) = update.roll_no {
            student.roll_no = Some(v);
        }
        if let Some(v) = update.gender {
            student.gender = v;
        }
        if let Some(ref v) = update.contact_number {
            student.contact_number = v.clone();
        }
        if let Some(ref v) = update.email {
            student.email = v.clone();
        }
        if let Some(ref v) = update.photo {
            student.photo = Some(v.clone());
        }
        if let Some(v) = update.is_active {
            student.is_active = v;
        }
        student.updated_at = Utc::now();

        state.check_student_unique(Some(id), &student)?;
        *state.student_mut(id)? = student.clone();
        Ok(student)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state()?;
        state.student(id)?;
        state.students.retain(|s| s.id != id);

        // Cascade like the foreign keys do
        let removed: Vec<Uuid> = state
            .borrows
            .iter()
            .filter(|r| r.student_id == id)
            .map(|r| r.id)
            .collect();
        state.borrows.retain(|r| r.student_id != id);
        state.fines.retain(|f| !removed.contains(&f.borrow_request_id));
        state.scans.retain(|s| s.student_id != id);
        Ok(())
    }
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let mut state = self.state()?;
        let seq = {
            let counter = state.book_sequences.entry(book.prefix.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let now = Utc::now();
        let created = Book {
            id: Uuid::new_v4(),
            book_id: format_book_code(&book.prefix, seq),
            title: book.title,
            author: book.author,
            publisher: book.publisher,
            isbn: book.isbn,
            section: book.section,
            genre: book.genre,
            language: book.language,
            publication_year: book.publication_year,
            cover_image: book.cover_image,
            description: book.description,
            status: book.status,
            total_copies: book.total_copies,
            available_copies: book.available_copies,
            rack: book.rack,
            shelf: book.shelf,
            tags: book.tags,
            rating_average: 0.0,
            rating_count: 0,
            created_at: now,
            updated_at: now,
        };
        if state.books.iter().any(|b| b.book_id == created.book_id) {
            return Err(AppError::Conflict("Book identifier already exists".to_string()));
        }
        state.books.push(created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        self.state()?.book(id).cloned()
    }

    async fn find_by_code(&self, book_id: &str) -> AppResult<Option<Book>> {
        let code = book_id.trim().to_uppercase();
        Ok(self
            .state()?
            .books
            .iter()
            .find(|b| b.book_id == code)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Book>> {
        let state = self.state()?;
        Ok(page(state.books.iter().rev().cloned(), limit, offset))
    }

    async fn list_all(&self) -> AppResult<Vec<Book>> {
        Ok(self.state()?.books.iter().rev().cloned().collect())
    }

    async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Book>> {
        let needle = query.to_lowercase();
        let state = self.state()?;
        let mut found: Vec<Book> = state
            .books
            .iter()
            .filter(|b| b.matches(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.title.cmp(&b.title));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        let mut state = self.state()?;
        let stored = state
            .books
            .iter_mut()
            .find(|b| b.id == book.id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        let mut updated = book.clone();
        // Identity and creation fields are owned by the store
        updated.book_id = stored.book_id.clone();
        updated.section = stored.section.clone();
        updated.created_at = stored.created_at;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state()?;
        state.book(id)?;
        state.books.retain(|b| b.id != id);

        let removed: Vec<Uuid> = state
            .borrows
            .iter()
            .filter(|r| r.book_id == id)
            .map(|r| r.id)
            .collect();
        state.borrows.retain(|r| r.book_id != id);
        state.fines.retain(|f| !removed.contains(&f.borrow_request_id));
        Ok(())
    }
}

#[async_trait]
impl BorrowsStore for MemoryStore {
    async fn create(
        &self,
        request: NewBorrowRequest,
        debit: CreditDebit,
    ) -> AppResult<Option<BorrowRequest>> {
        let mut state = self.state()?;
        state.book(request.book_id)?;
        let now = Utc::now();

        let student = state.student_mut(request.student_id)?;
        if student.version != debit.expected_version {
            return Ok(None);
        }
        student.credits = debit.credits_after;
        student.version += 1;
        student.updated_at = now;

        let created = BorrowRequest {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            book_id: request.book_id,
            status: BorrowStatus::Pending,
            borrowed_date: request.borrowed_date,
            expected_return_date: request.expected_return_date,
            long_term: request.long_term,
            return_date: None,
            remarks: request.remarks,
            approved_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        };
        state.borrows.push(created.clone());
        Ok(Some(created))
    }

    async fn get(&self, id: Uuid) -> AppResult<BorrowRequest> {
        self.state()?.borrow(id).cloned()
    }

    async fn get_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let state = self.state()?;
        let request = state.borrow(id)?;
        Ok(state.borrow_details(request))
    }

    async fn list(
        &self,
        filter: BorrowFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BorrowRequestDetails>> {
        let state = self.state()?;
        let matching = state
            .borrows
            .iter()
            .rev()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.student_id.map_or(true, |id| r.student_id == id))
            .map(|r| state.borrow_details(r));
        Ok(page(matching, limit, offset))
    }

    async fn find_by_pair(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> AppResult<Option<BorrowRequest>> {
        Ok(self
            .state()?
            .borrows
            .iter()
            .rev()
            .find(|r| r.student_id == student_id && r.book_id == book_id)
            .cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        to: BorrowStatus,
        at: DateTime<Utc>,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequest> {
        let mut state = self.state()?;
        let current = state.borrow(id)?.clone();

        if current.status != BorrowStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "Borrow request is already {}",
                current.status
            )));
        }
        if to == BorrowStatus::Pending {
            return Err(AppError::InvalidTransition(
                "Borrow request cannot return to Pending".to_string(),
            ));
        }

        state.apply_effects(&current, effects)?;

        let request = state.borrow_mut(id)?;
        request.status = to;
        match to {
            BorrowStatus::Approved => request.approved_at = Some(at),
            BorrowStatus::Rejected => request.rejected_at = Some(at),
            BorrowStatus::Pending => {}
        }
        request.updated_at = at;
        Ok(request.clone())
    }

    async fn mark_returned(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequest> {
        let mut state = self.state()?;
        let current = state.borrow(id)?.clone();

        if current.status != BorrowStatus::Approved {
            return Err(AppError::InvalidTransition(format!(
                "Only approved requests can be returned, this one is {}",
                current.status
            )));
        }
        if current.is_returned() {
            return Err(AppError::InvalidTransition(
                "Book has already been returned".to_string(),
            ));
        }

        state.apply_effects(&current, effects)?;

        let request = state.borrow_mut(id)?;
        request.return_date = Some(at);
        request.updated_at = at;
        Ok(request.clone())
    }

    async fn overdue(
        &self,
        now: DateTime<Utc>,
        approved_only: bool,
    ) -> AppResult<Vec<BorrowRequest>> {
        let state = self.state()?;
        let mut overdue: Vec<BorrowRequest> = state
            .borrows
            .iter()
            .filter(|r| r.return_date.is_none())
            .filter(|r| r.expected_return_date.map_or(false, |d| d < now))
            .filter(|r| !approved_only || r.status == BorrowStatus::Approved)
            .cloned()
            .collect();
        overdue.sort_by_key(|r| r.expected_return_date);
        Ok(overdue)
    }

    async fn approved_counts(&self) -> AppResult<Vec<(Uuid, i64)>> {
        let state = self.state()?;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for request in state
            .borrows
            .iter()
            .filter(|r| r.status == BorrowStatus::Approved)
        {
            *counts.entry(request.book_id).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl FinesStore for MemoryStore {
    async fn upsert(&self, borrow_request_id: Uuid, amount: i64, reason: &str) -> AppResult<Fine> {
        let mut state = self.state()?;
        state.borrow(borrow_request_id)?;
        let now = Utc::now();

        if let Some(fine) = state
            .fines
            .iter_mut()
            .find(|f| f.borrow_request_id == borrow_request_id)
        {
            if !fine.paid {
                fine.amount = amount;
                fine.reason = reason.to_string();
                fine.updated_at = now;
            }
            return Ok(fine.clone());
        }

        let fine = Fine {
            id: Uuid::new_v4(),
            borrow_request_id,
            amount,
            reason: reason.to_string(),
            paid: false,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        state.fines.push(fine.clone());
        Ok(fine)
    }

    async fn get(&self, id: Uuid) -> AppResult<Fine> {
        self.state()?
            .fines
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Fine not found".to_string()))
    }

    async fn list(
        &self,
        paid: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<FineDetails>> {
        let state = self.state()?;
        let matching = state
            .fines
            .iter()
            .rev()
            .filter(|f| paid.map_or(true, |p| f.paid == p))
            .map(|f| state.fine_details(f));
        Ok(page(matching, limit, offset))
    }

    async fn list_for_student(&self, student_id: Uuid) -> AppResult<Vec<FineDetails>> {
        let state = self.state()?;
        Ok(state
            .fines
            .iter()
            .rev()
            .filter(|f| {
                state
                    .borrow(f.borrow_request_id)
                    .map(|r| r.student_id == student_id)
                    .unwrap_or(false)
            })
            .map(|f| state.fine_details(f))
            .collect())
    }

    async fn unpaid(&self) -> AppResult<Vec<FineDetails>> {
        let state = self.state()?;
        Ok(state
            .fines
            .iter()
            .filter(|f| !f.paid)
            .map(|f| state.fine_details(f))
            .collect())
    }

    async fn mark_paid(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Fine> {
        let mut state = self.state()?;
        let fine = state.fine_mut(id)?;
        if fine.paid {
            return Err(AppError::Conflict("Fine is already paid".to_string()));
        }
        fine.paid = true;
        fine.paid_at = Some(at);
        fine.updated_at = at;
        Ok(fine.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state()?;
        state.fine_mut(id)?;
        state.fines.retain(|f| f.id != id);
        Ok(())
    }
}

#[async_trait]
impl ScansStore for MemoryStore {
    async fn append(&self, scan: NewScan) -> AppResult<Scan> {
        let mut state = self.state()?;
        state.student(scan.student_id)?;
        let created = Scan {
            id: Uuid::new_v4(),
            student_id: scan.student_id,
            scan_type: scan.scan_type,
            scanned_at: scan.scanned_at,
            device_id: scan.device_id,
            rfid_hex: scan.rfid_hex,
            rfid_decimal: scan.rfid_decimal,
        };
        state.scans.push(created.clone());
        Ok(created)
    }

    async fn latest(&self) -> AppResult<Option<ScanDetails>> {
        let state = self.state()?;
        let Some(scan) = state.scans.iter().max_by_key(|s| s.scanned_at) else {
            return Ok(None);
        };
        Ok(state.student(scan.student_id).ok().map(|student| ScanDetails {
            scan: scan.clone(),
            student: student.clone(),
        }))
    }

    async fn latest_for_student(
        &self,
        student_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Option<Scan>> {
        Ok(self
            .state()?
            .scans
            .iter()
            .filter(|s| s.student_id == student_id && s.scanned_at >= from && s.scanned_at < to)
            .max_by_key(|s| s.scanned_at)
            .cloned())
    }
}

#[async_trait]
impl SectionsStore for MemoryStore {
    async fn increment_visits(&self, section_name: &str) -> AppResult<Section> {
        Ok(self.state()?.bump_section(section_name, 1, 0))
    }

    async fn increment_books_bought(&self, section_name: &str) -> AppResult<Section> {
        Ok(self.state()?.bump_section(section_name, 0, 1))
    }

    async fn list(&self) -> AppResult<Vec<Section>> {
        let mut sections = self.state()?.sections.clone();
        sections.sort_by(|a, b| a.section_name.cmp(&b.section_name));
        Ok(sections)
    }
}
