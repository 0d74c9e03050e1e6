//! Per-block record of the literals and matches to be encoded.

use crate::error::{Error, Result};
use crate::tables::MIN_MATCH;

/// One tallied symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tally
{
  Literal( u8 ),
  Match { length: usize, distance: usize },
}

/// Fixed capacity parallel arrays: a byte ( literal, or match length - 3 ) and a distance ( 0 for a literal ).
pub struct TallyBuffer
{
  lit_len: Vec<u8>,
  dist: Vec<u16>,
  capacity: usize,
}

impl TallyBuffer
{
  pub fn new( capacity: usize ) -> Result<TallyBuffer>
  {
    let mut lit_len : Vec<u8> = Vec::new();
    let mut dist : Vec<u16> = Vec::new();
    let requested_bytes = capacity.saturating_mul( 3 );
    lit_len.try_reserve_exact( capacity ).map_err( |_| Error::AllocationFailed { requested_bytes } )?;
    dist.try_reserve_exact( capacity ).map_err( |_| Error::AllocationFailed { requested_bytes } )?;
    Ok( TallyBuffer { lit_len, dist, capacity } )
  }

  pub fn len( &self ) -> usize
  {
    self.lit_len.len()
  }

  pub fn is_empty( &self ) -> bool
  {
    self.lit_len.is_empty()
  }

  pub fn is_full( &self ) -> bool
  {
    self.lit_len.len() >= self.capacity
  }

  pub fn clear( &mut self )
  {
    self.lit_len.clear();
    self.dist.clear();
  }

  /// Caller checks is_full first.
  pub fn push( &mut self, t: Tally )
  {
    debug_assert!( !self.is_full(), "tally buffer pushed past capacity {}", self.capacity );
    match t
    {
      Tally::Literal( b ) =>
      {
        self.lit_len.push( b );
        self.dist.push( 0 );
      }
      Tally::Match { length, distance } =>
      {
        self.lit_len.push( ( length - MIN_MATCH ) as u8 );
        self.dist.push( distance as u16 );
      }
    }
  }

  pub fn iter( &self ) -> impl Iterator<Item = Tally> + '_
  {
    self.lit_len.iter().zip( &self.dist ).map( |( &b, &d )|
      if d == 0 { Tally::Literal( b ) }
      else { Tally::Match { length: b as usize + MIN_MATCH, distance: d as usize } }
    )
  }
}
