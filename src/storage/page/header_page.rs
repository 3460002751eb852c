use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::storage::page::page::PageId;

// Record table layout: a u32 record count followed by packed records of
// (name_len u32, name bytes, root_page_id u32). A zeroed page decodes as an
// empty table.
const NUM_RECORDS_OFFSET: u64 = 0;
const RECORDS_OFFSET: u64 = 4;

/// Walks the records; returns the cursor offset of the record's root field.
fn seek_record(data: &[u8], name: &str) -> Option<u64> {
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(NUM_RECORDS_OFFSET)).ok()?;
    let num_records = cursor.read_u32::<LittleEndian>().ok()?;
    cursor.seek(SeekFrom::Start(RECORDS_OFFSET)).ok()?;

    for _ in 0..num_records {
        let name_len = cursor.read_u32::<LittleEndian>().ok()? as usize;
        let mut buf = vec![0u8; name_len];
        cursor.read_exact(&mut buf).ok()?;

        if buf == name.as_bytes() {
            return Some(cursor.position());
        }
        cursor.seek(SeekFrom::Current(4)).ok()?;
    }
    None
}

/// Offset just past the last record, where a new one is appended.
fn end_of_records(data: &[u8]) -> Option<u64> {
    let mut cursor = Cursor::new(data);
    let num_records = cursor.read_u32::<LittleEndian>().ok()?;
    cursor.seek(SeekFrom::Start(RECORDS_OFFSET)).ok()?;
    for _ in 0..num_records {
        let name_len = cursor.read_u32::<LittleEndian>().ok()? as u64;
        cursor.seek(SeekFrom::Current(name_len as i64 + 4)).ok()?;
    }
    Some(cursor.position())
}

/// Looks up the root page id recorded under `name`.
pub fn find_record(data: &[u8], name: &str) -> Option<PageId> {
    let offset = seek_record(data, name)?;
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(offset)).ok()?;
    cursor.read_u32::<LittleEndian>().ok()
}

/// Appends a (name, root page id) record. Fails if the name is already
/// recorded or the page is out of space.
pub fn insert_record(data: &mut [u8], name: &str, root_page_id: PageId) -> bool {
    if seek_record(data, name).is_some() {
        return false;
    }
    let Some(end) = end_of_records(data) else {
        return false;
    };
    let record_len = 4 + name.len() as u64 + 4;
    if end + record_len > data.len() as u64 {
        return false;
    }

    let num_records = Cursor::new(&*data)
        .read_u32::<LittleEndian>()
        .unwrap_or(0);

    let mut cursor = Cursor::new(data);
    if cursor.seek(SeekFrom::Start(end)).is_err() {
        return false;
    }
    if cursor.write_u32::<LittleEndian>(name.len() as u32).is_err()
        || cursor.write_all(name.as_bytes()).is_err()
        || cursor.write_u32::<LittleEndian>(root_page_id).is_err()
    {
        return false;
    }

    cursor.seek(SeekFrom::Start(NUM_RECORDS_OFFSET)).unwrap();
    cursor
        .write_u32::<LittleEndian>(num_records + 1)
        .is_ok()
}

/// Rewrites the root page id recorded under `name`. Fails if absent.
pub fn update_record(data: &mut [u8], name: &str, root_page_id: PageId) -> bool {
    let Some(offset) = seek_record(data, name) else {
        return false;
    };
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(offset)).unwrap();
    cursor.write_u32::<LittleEndian>(root_page_id).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::page::page::{page_constants::PAGE_SIZE, INVALID_PAGE_ID};

    #[test]
    fn record_round_trip() {
        let mut data = vec![0u8; PAGE_SIZE];

        assert_eq!(None, find_record(&data, "orders_pk"));
        assert!(insert_record(&mut data, "orders_pk", INVALID_PAGE_ID));
        assert!(!insert_record(&mut data, "orders_pk", 3));
        assert_eq!(Some(INVALID_PAGE_ID), find_record(&data, "orders_pk"));

        assert!(insert_record(&mut data, "orders_date", 17));
        assert!(update_record(&mut data, "orders_pk", 9));
        assert_eq!(Some(9), find_record(&data, "orders_pk"));
        assert_eq!(Some(17), find_record(&data, "orders_date"));

        assert!(!update_record(&mut data, "missing", 1));
    }
}
