/*
 * Copyright 2026 Oxide Computer Company
 */

//! Classification of ctds device names.

/**
 * The final path component of a device name; "/dev/dsk/c0t0d0s0" and
 * "c0t0d0s0" both yield "c0t0d0s0".
 */
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/*
 * Split a trailing "<letter><digits>" suffix from a basename, returning the
 * leading part and the digits.
 */
fn suffix(name: &str, letter: char) -> Option<(&str, &str)> {
    let b = basename(name);
    let digits = b.len() - b.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let (head, num) = b.split_at(b.len() - digits);
    let head = head.strip_suffix(letter)?;
    if head.is_empty() {
        return None;
    }
    Some((head, num))
}

/**
 * A partition name ends with "p<digits>", e.g. "c0t0d0p1".
 */
pub fn is_partition_name(name: &str) -> bool {
    suffix(name, 'p').is_some()
}

/**
 * A slice name ends with "s<digit>" or "s1[0-5]", e.g. "c0t0d0s15".
 */
pub fn is_slice_name(name: &str) -> bool {
    slice_index(name).is_some()
}

pub fn slice_index(name: &str) -> Option<u32> {
    let (_, num) = suffix(name, 's')?;
    match num.len() {
        1 => num.parse().ok(),
        2 if num.starts_with('1') => {
            num.parse::<u32>().ok().filter(|n| *n <= 15)
        }
        _ => None,
    }
}

pub fn partition_number(name: &str) -> Option<u32> {
    suffix(name, 'p').and_then(|(_, num)| num.parse().ok())
}

/**
 * Strip any trailing slice or partition suffix, leaving the disk portion of
 * the basename.
 */
pub fn disk_name(name: &str) -> &str {
    if is_slice_name(name) {
        suffix(name, 's').map(|(h, _)| h).unwrap_or(name)
    } else if let Some((h, _)) = suffix(name, 'p') {
        h
    } else {
        basename(name)
    }
}

/**
 * Apply the boot device naming rule: a path under /dev/dsk whose basename ends
 * in "s<digits>" or "p<digits>".  Returns the disk portion of the name.
 */
pub fn boot_disk_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/dev/dsk/")?;
    if rest.contains('/') {
        return None;
    }
    suffix(rest, 's').or_else(|| suffix(rest, 'p')).map(|(h, _)| h)
}
