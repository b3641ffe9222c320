//! Wipes secrets out of GMP-managed memory once they are released.
//!
//! Big integers ultimately live in heap buffers that GMP allocates and
//! copies on its own, invisibly to `zeroize`-annotated Rust types. GMP
//! accepts a custom implementation of its memory management (alloc /
//! realloc / free); we override realloc and free with wrappers that erase
//! every buffer before handing it back.

use gmp_mpfr_sys::gmp::{
    allocate_function, free_function, get_memory_functions, reallocate_function,
    set_memory_functions,
};
use std::{ffi::c_void, ptr::addr_of_mut, slice, sync::Once};
use zeroize::Zeroize;

static INSTALL: Once = Once::new();

/// Enable zeroization of GMP memory allocations.
///
/// This should be called on startup before any protocol.
pub fn enable_zeroize() {
    INSTALL.call_once(install_wiping_allocators);
}

// GMP's stock allocator triple, captured before ours goes in so the wrappers
// can delegate the actual memory work.
static mut STOCK_ALLOC: allocate_function = None;
static mut STOCK_REALLOC: reallocate_function = None;
static mut STOCK_FREE: free_function = None;

fn install_wiping_allocators() {
    unsafe {
        // SAFETY: the custom-allocation C API (gmplib.org/manual/Custom-Allocation)
        // hands back whatever functions are currently installed.
        get_memory_functions(
            addr_of_mut!(STOCK_ALLOC),
            addr_of_mut!(STOCK_REALLOC),
            addr_of_mut!(STOCK_FREE),
        );

        // GMP documents no failure mode here, so a missing function would
        // mean something is badly wrong with the linked library.
        assert!(
            STOCK_ALLOC.and(STOCK_REALLOC).and(STOCK_FREE).is_some(),
            "GMP should return its memory functions."
        );

        // Allocation of a fresh buffer has nothing to wipe; only the two
        // releasing paths are replaced.
        set_memory_functions(None, Some(wiping_realloc), Some(wiping_free));
    }
}

extern "C" fn wiping_realloc(
    old_ptr: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    // Delegating to the stock realloc would surrender the old buffer before
    // it can be erased, so grow by hand: fresh buffer, copy, wipe, release.
    unsafe {
        // SAFETY: install_wiping_allocators captured the stock functions
        // before this wrapper could ever run.
        let new_ptr = STOCK_ALLOC.unwrap()(new_size);

        // SAFETY: GMP guarantees old_ptr is a live allocation of old_size
        // bytes, and the stock alloc just produced new_size valid bytes.
        {
            let overlap = old_size.min(new_size);
            let old_data = slice::from_raw_parts(old_ptr as *const u8, overlap);
            let new_data = slice::from_raw_parts_mut(new_ptr as *mut u8, overlap);
            new_data.copy_from_slice(old_data);
        }

        wiping_free(old_ptr, old_size);

        new_ptr
    }
}

extern "C" fn wiping_free(ptr: *mut c_void, size: usize) {
    unsafe {
        // SAFETY: GMP guarantees ptr is a live allocation of exactly size
        // bytes; it is erased before the stock free reclaims it.
        let data = slice::from_raw_parts_mut(ptr as *mut u8, size);
        data.zeroize();

        // SAFETY: captured before this wrapper was installed.
        STOCK_FREE.unwrap()(ptr, size);
    }
}
