//! LZ77 match finding: hash chains over 3 byte prefixes with optional lazy matching.

use crossbeam::channel::Sender;

use crate::tables::{MAX_DISTANCE, MAX_MATCH, MIN_MATCH};
use crate::Options;

/// A back reference found by the matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match
{
  pub position: usize,
  pub length: usize,
  pub distance: usize,
}

/// Head and chain entries hold position + WINDOW_OFFSET. Zero is an empty slot, and an entry
/// not greater than the current position is more than MAX_DISTANCE back.
const WINDOW_OFFSET : usize = MAX_DISTANCE + 1;

/// Send matches for input in increasing position order, never overlapping. Stops early if the receiver goes away.
pub fn find_matches( input: &[u8], output: Sender<Match>, opts: &Options )
{
  if input.len() > MIN_MATCH
  {
    let mut m = Matcher::new( input.len(), opts );
    m.find( input, |mat| output.send( mat ).is_ok() );
  }
}

/// Hash chains keyed on the three bytes starting at each position.
struct Chains
{
  shift: usize,
  mask: usize,
  head: Vec<usize>, // Most recent position for each hash.
  prev: Vec<usize>, // For each position, the previous head of its hash.
}

impl Chains
{
  fn new( len: usize ) -> Chains
  {
    let shift = hash_shift( len * 2 );
    let mask = ( 1 << ( MIN_MATCH * shift ) ) - 1;
    Chains
    {
      shift,
      mask,
      head: vec![ 0; mask + 1 ],
      prev: vec![ 0; len - 2 ],
    }
  }

  fn hash( &self, input: &[u8], p: usize ) -> usize
  {
    ( ( ( input[ p ] as usize ) << ( 2 * self.shift ) )
      + ( ( input[ p + 1 ] as usize ) << self.shift )
      + input[ p + 2 ] as usize ) & self.mask
  }

  /// Make p the head of its chain. Returns the previous head if it is within reach.
  fn insert( &mut self, input: &[u8], p: usize ) -> Option<usize>
  {
    let h = self.hash( input, p );
    let entry = self.head[ h ];
    self.head[ h ] = p + WINDOW_OFFSET;
    self.prev[ p ] = entry;
    if p < entry { Some( entry - WINDOW_OFFSET ) } else { None }
  }

  /// Next candidate after c on its chain, if still within reach of p.
  fn next( &self, c: usize, p: usize ) -> Option<usize>
  {
    let entry = self.prev[ c ];
    if entry > p { Some( entry - WINDOW_OFFSET ) } else { None }
  }

  /// Whether the three bytes at p occur anywhere within reach.
  fn seen( &self, input: &[u8], p: usize ) -> bool
  {
    p < self.head[ self.hash( input, p ) ]
  }
}

struct Matcher
{
  chains: Chains,
  probe_max: usize,
  lazy_match: bool,
}

impl Matcher
{
  fn new( len: usize, opts: &Options ) -> Matcher
  {
    Matcher
    {
      chains: Chains::new( len ),
      probe_max: opts.probe_max,
      lazy_match: opts.lazy_match,
    }
  }

  /// Find matches, passing each to emit. Stops when emit returns false.
  fn find<F: FnMut( Match ) -> bool>( &mut self, input: &[u8], mut emit: F )
  {
    let end = input.len() - 2; // Positions with three bytes available.
    let mut p = 0;
    while p < end
    {
      let candidate = match self.chains.insert( input, p )
      {
        Some( c ) => c,
        None => { p += 1; continue; }
      };
      let ( mut length, mut distance ) = self.longest( input, p, candidate );
      let mut start = p;
      p += 1;
      if length < MIN_MATCH { continue; }

      // Lazy matching, RFC 1951 p.15: while the next position does better, start there instead.
      while p < end
      {
        let candidate = match self.chains.insert( input, p )
        {
          Some( c ) if self.lazy_match => c,
          _ => break,
        };
        let ( l, d ) = self.longest( input, p, candidate );
        if l > length || l == length && d < distance
        {
          length = l;
          distance = d;
          start = p;
          p += 1;
        }
        else { break; }
      }

      if !emit( Match { position: start, length, distance } ) { return; }

      // start + 1 is already on its chain. Add the rest of the copied bytes.
      let copy_end = std::cmp::min( start + length, end );
      p = start + 2;
      while p < copy_end
      {
        self.chains.insert( input, p );
        p += 1;
      }
    }
  }

  /// Longest ( length, distance ) for p along the chain starting at candidate.
  fn longest( &self, input: &[u8], p: usize, mut candidate: usize ) -> ( usize, usize )
  {
    let avail = std::cmp::min( input.len() - p, MAX_MATCH );
    let ( mut best_length, mut best_distance ) = ( 0, 0 );
    let mut probes = self.probe_max;
    while probes > 0
    {
      // A longer match must agree on the byte just past the current best.
      if input[ candidate + best_length ] == input[ p + best_length ]
      {
        let n = input[ p..p + avail ].iter().zip( &input[ candidate.. ] ).take_while( |( a, b )| a == b ).count();
        if n > best_length
        {
          best_length = n;
          best_distance = p - candidate;
          // Stop if a match one byte longer cannot exist.
          if n == avail || !self.chains.seen( input, p + n - 2 ) { break; }
          probes = self.probe_max;
        }
      }
      candidate = match self.chains.next( candidate, p )
      {
        Some( c ) => c,
        None => break,
      };
      probes -= 1;
    }
    ( best_length, best_distance )
  }
}

/// Bits per byte in the hash: enough for 8^shift to cover n, at most 6.
fn hash_shift( n: usize ) -> usize
{
  let mut shift = 0;
  while shift < 6 && ( 1usize << ( MIN_MATCH * shift ) ) < n { shift += 1; }
  shift
}
