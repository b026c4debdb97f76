use bincode::{Decode, Encode};

// A plaintext polynomial over Z/tZ in the ring Z_t[x]/(x^n + 1).
// Coefficients are stored lowest power first, each reduced below the modulus.
// Trailing zero coefficients are never stored, so the null polynomial has no coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Polynomial {
    coefficients: Vec<u64>,
}

impl Polynomial {
    // Coefficients must already be reduced modulo the plain modulus.
    pub fn new(mut coefficients: Vec<u64>) -> Self {
        while coefficients.last() == Some(&0) {
            coefficients.pop();
        }
        Self { coefficients }
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[u64] {
        &self.coefficients
    }

    // Whether this polynomial lives in Z_t[x]/(x^n + 1) as stored: at most `degree`
    // coefficients, each below the modulus, no trailing zero.
    pub fn is_reduced(&self, degree: usize, modulus: u64) -> bool {
        self.coefficients.len() <= degree
            && self.coefficients.last() != Some(&0)
            && self.coefficients.iter().all(|&c| c < modulus)
    }

    pub fn nonzero_count(&self) -> usize {
        self.coefficients.iter().filter(|&&c| c != 0).count()
    }

    // Largest coefficient in absolute value, taking representatives in (-t/2, t/2].
    pub fn max_centered(&self, modulus: u64) -> u64 {
        self.coefficients
            .iter()
            .map(|&c| {
                let c = c % modulus.max(1);
                c.min(modulus - c)
            })
            .max()
            .unwrap_or(0)
    }

    pub fn add_fn(&self, other: &Self, modulus: u64) -> Self {
        let len = self.coefficients.len().max(other.coefficients.len());
        let result = (0..len)
            .map(|i| {
                let a = self.coefficients.get(i).copied().unwrap_or(0);
                let b = other.coefficients.get(i).copied().unwrap_or(0);
                add_mod(a, b, modulus)
            })
            .collect();
        Self::new(result)
    }

    pub fn sub_fn(&self, other: &Self, modulus: u64) -> Self {
        self.add_fn(&other.neg_fn(modulus), modulus)
    }

    pub fn neg_fn(&self, modulus: u64) -> Self {
        let result = self
            .coefficients
            .iter()
            .map(|&c| {
                let c = c % modulus;
                if c == 0 {
                    0
                } else {
                    modulus - c
                }
            })
            .collect();
        Self::new(result)
    }

    // Negacyclic product: x^n wraps around to -1.
    // Only nonzero terms are visited, which keeps the small plaintexts used by
    // integer arithmetic cheap to multiply.
    pub fn mul_fn(&self, other: &Self, degree: usize, modulus: u64) -> Self {
        if self.is_null() || other.is_null() || degree == 0 {
            return Self::null();
        }

        let len = (self.coefficients.len() + other.coefficients.len() - 1).min(degree);
        let mut result = vec![0; len];

        for (i, &a) in self.coefficients.iter().enumerate() {
            if a == 0 {
                continue;
            }
            for (j, &b) in other.coefficients.iter().enumerate() {
                if b == 0 {
                    continue;
                }
                let product = mul_mod(a, b, modulus);
                let k = i + j;
                // x^(2n) = 1, so the sign flips once per wrap
                let negated = (k / degree) % 2 == 1;
                let slot = &mut result[k % degree];
                *slot = if negated {
                    add_mod(*slot, modulus - product, modulus)
                } else {
                    add_mod(*slot, product, modulus)
                };
            }
        }

        Self::new(result)
    }
}

fn add_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) + u128::from(b)) % u128::from(modulus)) as u64
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(modulus)) as u64
}

#[cfg(test)]
mod test {
    use super::Polynomial;

    const T: u64 = 65537;

    #[test]
    fn test_new_trims() {
        let p = Polynomial::new(vec![1, 2, 0, 0]);
        assert_eq!(p.coefficients(), &[1, 2]);
    }

    #[test]
    fn test_null() {
        let p = Polynomial::null();
        assert!(p.is_null());
        assert!(Polynomial::new(vec![0, 0]).is_null());
    }

    #[test]
    fn test_is_reduced() {
        assert!(Polynomial::new(vec![1, T - 1]).is_reduced(4, T));
        assert!(Polynomial::null().is_reduced(4, T));
        assert!(!Polynomial::new(vec![T]).is_reduced(4, T));
        assert!(!Polynomial::new(vec![1; 5]).is_reduced(4, T));
    }

    #[test]
    fn test_add_fn() {
        let p1 = Polynomial::new(vec![T - 1, 2]);
        let p2 = Polynomial::new(vec![3]);
        assert_eq!(p1.add_fn(&p2, T).coefficients(), &[2, 2]);

        let p3 = Polynomial::new(vec![0, T - 2]);
        assert_eq!(p1.add_fn(&p3, T).coefficients(), &[T - 1]);
    }

    #[test]
    fn test_sub_and_neg() {
        let p = Polynomial::new(vec![5, 1]);
        assert!(p.sub_fn(&p, T).is_null());
        assert_eq!(p.neg_fn(T).coefficients(), &[T - 5, T - 1]);
        let diff = Polynomial::new(vec![3]).sub_fn(&Polynomial::new(vec![5]), T);
        assert_eq!(diff.coefficients(), &[T - 2]);
    }

    #[test]
    fn test_mul_fn() {
        let p1 = Polynomial::new(vec![1, 1]);
        let p2 = Polynomial::new(vec![1, 1]);
        assert_eq!(p1.mul_fn(&p2, 8, T).coefficients(), &[1, 2, 1]);

        let big = Polynomial::new(vec![T - 1]);
        assert_eq!(big.mul_fn(&big, 8, T).coefficients(), &[1]);

        assert!(p1.mul_fn(&Polynomial::null(), 8, T).is_null());
    }

    #[test]
    fn test_mul_fn_wraps_negacyclically() {
        // x^3 * x = x^4 = -1 in Z_t[x]/(x^4 + 1)
        let p1 = Polynomial::new(vec![0, 0, 0, 1]);
        let p2 = Polynomial::new(vec![0, 1]);
        assert_eq!(p1.mul_fn(&p2, 4, T).coefficients(), &[T - 1]);
    }

    #[test]
    fn test_unreduced_operands_do_not_overflow() {
        let huge = Polynomial::new(vec![u64::MAX - 1, u64::MAX]);
        let sum = huge.add_fn(&huge, T);
        assert!(sum.is_reduced(8, T));
        assert!(huge.neg_fn(T).is_reduced(8, T));
        assert!(huge.sub_fn(&huge, T).is_null());
        assert!(huge.max_centered(T) <= T / 2);

        // More coefficients than the degree wrap around instead of indexing past the end
        let long = Polynomial::new(vec![1; 10]);
        let product = long.mul_fn(&long, 4, T);
        assert!(product.is_reduced(4, T));
        assert!(long.mul_fn(&long, 0, T).is_null());
    }

    #[test]
    fn test_max_centered() {
        let p = Polynomial::new(vec![3, T - 10, 4]);
        assert_eq!(p.max_centered(T), 10);
        assert_eq!(p.nonzero_count(), 3);
        assert_eq!(Polynomial::null().max_centered(T), 0);
    }
}
