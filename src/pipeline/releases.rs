// src/pipeline/releases.rs

//! Static information about known Debian releases

/// A released suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub codename: &'static str,
    pub version: &'static str,
    /// Release date, `YYYY-MM-DD`
    pub date: &'static str,
    /// Moved off the main mirrors to the archive
    pub archived: bool,
}

const fn release(codename: &'static str, version: &'static str, date: &'static str, archived: bool) -> Release {
    Release {
        codename,
        version,
        date,
        archived,
    }
}

pub const RELEASES: &[Release] = &[
    release("buzz", "1.1", "1996-06-17", true),
    release("rex", "1.2", "1996-12-12", true),
    release("bo", "1.3", "1997-06-05", true),
    release("hamm", "2.0", "1998-07-24", true),
    release("slink", "2.1", "1999-03-09", true),
    release("potato", "2.2", "2000-08-15", true),
    release("woody", "3.0", "2002-07-19", true),
    release("sarge", "3.1", "2005-06-06", true),
    release("etch", "4.0", "2007-04-08", true),
    release("lenny", "5.0", "2009-02-14", true),
    release("squeeze", "6.0", "2011-02-06", true),
    release("wheezy", "7", "2013-05-04", true),
    release("jessie", "8", "2015-04-25", true),
    release("stretch", "9", "2017-06-17", true),
    release("buster", "10", "2019-07-06", true),
    release("bullseye", "11", "2021-08-14", false),
    release("bookworm", "12", "2023-06-10", false),
    release("trixie", "13", "2025-08-09", false),
];

/// Look up a release by codename
pub fn lookup(codename: &str) -> Option<&'static Release> {
    RELEASES.iter().find(|r| r.codename == codename)
}
